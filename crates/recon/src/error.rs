use std::fmt;

#[derive(Debug)]
pub enum QcError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad tolerance, inverted thresholds, etc.).
    ConfigValidation(String),
    /// Top-level input is not valid JSON.
    InputParse { source_name: String, message: String },
    /// Edit overlay could not be deserialized.
    OverlayParse(String),
}

impl fmt::Display for QcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InputParse { source_name, message } => {
                write!(f, "{source_name}: not valid JSON: {message}")
            }
            Self::OverlayParse(msg) => write!(f, "edit overlay error: {msg}"),
        }
    }
}

impl std::error::Error for QcError {}
