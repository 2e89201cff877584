use thiserror::Error;

/// Represents all possible errors produced by the request executor
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid request spec: {0}")]
    InvalidSpec(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("transport failure after {attempts} attempt(s): {message}")]
    Transport { message: String, attempts: u32 },

    #[error("exhausted {attempts} attempt(s) without satisfying the poll condition: {}", .reasons.join("; "))]
    PollingExhausted { attempts: u32, reasons: Vec<String> },

    #[error("exhausted {attempts} attempt(s), last status {last_status} still retryable")]
    RetryExhausted { attempts: u32, last_status: u16 },

    #[error("expectation validation failed: {}", .0.join("; "))]
    ExpectationFailed(Vec<String>),

    #[error("interpolation failed: output key '{0}' not found in prior state")]
    InterpolationKeyMissing(String),

    #[error("operation deadline elapsed before the request completed")]
    Cancelled {
        last_status: Option<u16>,
        unsatisfied: Vec<String>,
    },
}

/// Type alias for Result with the executor error
pub type Result<T> = std::result::Result<T, Error>;
