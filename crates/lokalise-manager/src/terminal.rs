use std::io::{self, BufRead, Write};

/// Where user-facing messages go and confirmations come from.
pub trait Terminal: Send + Sync {
    /// Print a message to the user.
    fn notice(&self, message: &str);

    /// Show `prompt` and read one line of input.
    fn confirm(&self, prompt: &str) -> io::Result<String>;
}

/// Writes to stdout and reads stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTerminal;

impl Terminal for StdTerminal {
    fn notice(&self, message: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }

    fn confirm(&self, prompt: &str) -> io::Result<String> {
        {
            let mut out = io::stdout().lock();
            write!(out, "{prompt}")?;
            out.flush()?;
        }

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// True if `answer` is the affirmative reply (`Y`, any case, surrounding whitespace ignored).
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
