use std::fmt::{self, Write as _};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Schema construction failure (duplicate names, bad defaults).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Structural parse failure; the message carries the source name and
    /// 1-based line number.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Type-specific value parse failure.
    #[error("Value error: {0}")]
    Value(String),

    /// Post-parse hook failure or livelocked validation.
    #[error("Post-parse error: {0}")]
    PostParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fixed message recorded when formatting a message itself fails.
pub const FALLBACK_FORMAT: &str = "Error formatting error message";

/// Fixed message recorded when the message buffer cannot be allocated.
pub const FALLBACK_ALLOC: &str = "Failed to allocate memory for error message";

/// Session-scoped "last diagnostic" slot.
///
/// Propagation happens through [`Result`]; this is a convenience adapter for
/// callers that want one current human-readable message to surface. Recording
/// never fails: a `Display` impl that errors falls back to
/// [`FALLBACK_FORMAT`], and a failed buffer allocation falls back to
/// [`FALLBACK_ALLOC`]. Not safe to share across threads without external
/// synchronization.
#[derive(Debug, Default)]
pub struct ErrorLog {
    message: Option<String>,
    fallback: Option<&'static str>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message, replacing the previous one.
    pub fn record(&mut self, msg: impl fmt::Display) {
        match render(&msg) {
            Ok(text) => {
                self.message = Some(text);
                self.fallback = None;
            }
            Err(fixed) => {
                self.message = None;
                self.fallback = Some(fixed);
            }
        }
    }

    /// Record a message formatted from the previous one. The old message is
    /// detached first and stays alive until the replacement is committed, so
    /// the closure may borrow from it freely.
    pub fn rerecord<F>(&mut self, f: F)
    where
        F: FnOnce(Option<&str>) -> String,
    {
        let old = self.message.take();
        let previous = match self.fallback {
            Some(fixed) => Some(fixed),
            None => old.as_deref(),
        };
        let new = f(previous);
        self.message = Some(new);
        self.fallback = None;
    }

    /// The current message, or `None` if nothing was recorded since init.
    pub fn last(&self) -> Option<&str> {
        match self.fallback {
            Some(fixed) => Some(fixed),
            None => self.message.as_deref(),
        }
    }

    pub fn clear(&mut self) {
        self.message = None;
        self.fallback = None;
    }
}

/// Render a message sized up front: count the formatted length first, then
/// reserve exactly and write. Distinguishes "the format step failed" from
/// "the buffer could not grow", which get different fixed fallbacks.
fn render(msg: &dyn fmt::Display) -> std::result::Result<String, &'static str> {
    struct CountWriter(usize);

    impl fmt::Write for CountWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 += s.len();
            Ok(())
        }
    }

    let mut counter = CountWriter(0);
    if write!(counter, "{msg}").is_err() {
        return Err(FALLBACK_FORMAT);
    }

    let mut buf = String::new();
    if buf.try_reserve_exact(counter.0).is_err() {
        return Err(FALLBACK_ALLOC);
    }
    if write!(buf, "{msg}").is_err() {
        return Err(FALLBACK_FORMAT);
    }
    Ok(buf)
}
