use reqwest::StatusCode;
use thiserror::Error;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, HomebridgeError>;

/// Errors returned by this crate.
///
/// Only construction-time failures (configuration, login) and transport or
/// decoding failures are errors. A bridge answering an accessory call with a
/// non-success status is reported through the returned value instead.
#[derive(Debug, Error)]
pub enum HomebridgeError {
    /// Required credentials are empty. Lists the variable names in a fixed order.
    #[error("Missing environment variables: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    /// An optional setting was present but could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },

    /// The login endpoint rejected the credentials.
    #[error("authentication failed with status {status}: {body}")]
    Authentication { status: StatusCode, body: String },

    /// The login endpoint answered 2xx but without an `access_token`.
    #[error("login response did not contain an access_token")]
    MissingAccessToken,

    /// A listing endpoint answered with a non-success status.
    #[error("{endpoint} returned status {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    /// Transport failure (connect, TLS, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HomebridgeError {
    /// Names of the missing variables for a `Configuration` error, empty otherwise.
    pub fn missing_variables(&self) -> &[&'static str] {
        match self {
            Self::Configuration { missing } => missing,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_message_lists_every_missing_name() {
        let err = HomebridgeError::Configuration {
            missing: vec!["HOMEBRIDGE_USERNAME", "HOMEBRIDGE_PASSWORD"],
        };
        assert_eq!(
            err.to_string(),
            "Missing environment variables: HOMEBRIDGE_USERNAME, HOMEBRIDGE_PASSWORD"
        );
        assert_eq!(err.missing_variables().len(), 2);
    }

    #[test]
    fn non_configuration_errors_have_no_missing_names() {
        assert!(HomebridgeError::MissingAccessToken.missing_variables().is_empty());
    }
}
