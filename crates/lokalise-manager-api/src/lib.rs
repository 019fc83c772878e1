pub mod client;
pub mod factory;
pub mod responses;

pub use client::{DEFAULT_API_HOST, LokaliseClient};
pub use factory::{LokaliseClientFactory, Transport};
