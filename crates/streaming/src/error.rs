use std::time::Duration;

use formats::ShapeError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    HttpStatus(u16),
    /// The body could not be mapped to an item array.
    Shape,
    /// Connection failure or unreadable body.
    Transport,
}

/// One failed fetch attempt.
///
/// Unreadable geometries never become a `FetchError`: the parser drops those
/// items and keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FetchErrorKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    pub fn http_status(status: u16) -> Self {
        Self::new(FetchErrorKind::HttpStatus(status), format!("HTTP {status}"))
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, message)
    }

    /// Timeouts, 5xx, shape and transport errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FetchErrorKind::Timeout | FetchErrorKind::Shape | FetchErrorKind::Transport => true,
            FetchErrorKind::HttpStatus(status) => (500..600).contains(&status),
        }
    }

    /// Short user-facing category.
    pub fn label(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::HttpStatus(s) if s >= 500 => "server error",
            FetchErrorKind::HttpStatus(_) => "request rejected",
            FetchErrorKind::Shape => "invalid shape",
            FetchErrorKind::Transport => "connection failed",
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.message)
    }
}

impl std::error::Error for FetchError {}

impl From<ShapeError> for FetchError {
    fn from(e: ShapeError) -> Self {
        Self::new(FetchErrorKind::Shape, e.to_string())
    }
}

/// Terminal outcome of a fetch: the last error and how many attempts ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub last: FetchError,
    pub attempts: u32,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.last.is_retryable() {
            write!(f, "{}; exhausted after {} attempts", self.last, self.attempts)
        } else {
            write!(f, "{}", self.last)
        }
    }
}

impl std::error::Error for FetchFailure {}
