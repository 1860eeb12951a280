/// Result alias that carries the custom [`PulsefallError`] type.
pub type Result<T> = std::result::Result<T, PulsefallError>;

/// Common error type for the core crate.
///
/// Gameplay itself never fails: a bad tick degrades to a skipped beat or a
/// missed note. Errors only surface while building a game (configuration,
/// track loading) or from the spectrum transform.
#[derive(Debug, thiserror::Error)]
pub enum PulsefallError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Input data that cannot be processed at all.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A configuration value outside of its accepted range.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or event (de)serialisation failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Failure reported by the FFT backend.
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
}

impl PulsefallError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<&str> for PulsefallError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PulsefallError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
