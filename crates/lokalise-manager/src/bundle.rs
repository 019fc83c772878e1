use std::time::Duration;

use tracing::debug;

use crate::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// True if `location` names a remote resource rather than a local file.
pub fn is_remote(location: &str) -> bool {
    reqwest::Url::parse(location).is_ok_and(|url| url.scheme().starts_with("http"))
}

/// Read the bundle at `location`: an `http(s)://` URL or a local path.
pub async fn fetch(location: &str) -> Result<Vec<u8>, Error> {
    if is_remote(location) {
        download(location).await
    } else {
        debug!(path = location, "reading local bundle");
        tokio::fs::read(location)
            .await
            .map_err(|e| Error::io(location, e))
    }
}

async fn download(url: &str) -> Result<Vec<u8>, Error> {
    debug!(url, "downloading bundle");
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()
        .map_err(|e| Error::Bundle(format!("failed to build HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Bundle(format!("request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Bundle(format!(
            "{url} returned HTTP {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Bundle(format!("failed to read body of {url}: {e}")))?;

    Ok(bytes.to_vec())
}
