//! Error types shared by the dispatch framework, the CIM layer and command modules.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exit status for invalid command-line shapes (matches clap's usage errors).
pub const EXIT_USAGE: u8 = 2;
/// Exit status for anything that went wrong while talking to a provider.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum Error {
    /// Options parsed fine but their combination or shape is not acceptable.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A command could not complete (missing object, refused operation, ...).
    #[error("{0}")]
    Failed(String),

    /// A CheckResult command returned something other than what it expects.
    #[error("unexpected result: expected {expected}, got {got}")]
    UnexpectedResult { expected: String, got: String },

    /// Provider method returned a non-zero code.
    #[error("{method} failed with return code {code}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    ProviderFailed {
        method: String,
        code: i64,
        message: Option<String>,
    },

    /// Bridge process / transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed payload from the bridge.
    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn failed(msg: impl Into<String>) -> Self {
        Error::Failed(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidOptions(msg.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InvalidOptions(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Transport(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_options_exit_with_usage_status() {
        assert_eq!(Error::invalid("bad").exit_code(), EXIT_USAGE);
        assert_eq!(Error::failed("no such user").exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn provider_failure_display() {
        let err = Error::ProviderFailed {
            method: "CreateAccount".into(),
            code: 4,
            message: Some("user exists".into()),
        };
        assert_eq!(
            err.to_string(),
            "CreateAccount failed with return code 4: user exists"
        );
        let bare = Error::ProviderFailed {
            method: "DeleteUser".into(),
            code: 1,
            message: None,
        };
        assert_eq!(bare.to_string(), "DeleteUser failed with return code 1");
    }

    #[test]
    fn anyhow_errors_become_transport_errors() {
        let err: Error = anyhow::anyhow!("pipe closed").context("calling bridge").into();
        match err {
            Error::Transport(msg) => assert!(msg.contains("pipe closed")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
