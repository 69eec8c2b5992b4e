use std::{fmt, time::Duration};

use crate::error::{HomebridgeError, Result};

pub const ENV_USERNAME: &str = "HOMEBRIDGE_USERNAME";
pub const ENV_PASSWORD: &str = "HOMEBRIDGE_PASSWORD";
pub const ENV_BASE_URL: &str = "HOMEBRIDGE_URL";
pub const ENV_REAUTH: &str = "HOMEBRIDGE_REAUTH";
pub const ENV_TIMEOUT_SECS: &str = "HOMEBRIDGE_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "http://raspberrypi1.local:8581";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Config {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Re-login once and retry when a request comes back `401`.
    pub reauth_on_unauthorized: bool,
    /// Per-request timeout. `None` keeps the transport default (unbounded).
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            username: username.into(),
            password: password.into(),
            reauth_on_unauthorized: true,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_reauth(mut self, enabled: bool) -> Self {
        self.reauth_on_unauthorized = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads the process environment.
    ///
    /// Missing credentials are left empty here and reported by
    /// [`Config::validate`] when the client connects.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        let reauth_raw = optional(ENV_REAUTH, "true");
        let reauth_on_unauthorized = parse_bool(&reauth_raw).ok_or_else(|| {
            HomebridgeError::InvalidConfig {
                key: ENV_REAUTH,
                value: reauth_raw.clone(),
            }
        })?;

        let timeout = match lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            None => None,
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    HomebridgeError::InvalidConfig {
                        key: ENV_TIMEOUT_SECS,
                        value: raw.clone(),
                    }
                })?;
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Self {
            base_url: optional(ENV_BASE_URL, DEFAULT_BASE_URL),
            username: lookup(ENV_USERNAME).unwrap_or_default(),
            password: lookup(ENV_PASSWORD).unwrap_or_default(),
            reauth_on_unauthorized,
            timeout,
        })
    }

    /// Fails with [`HomebridgeError::Configuration`] naming every empty credential.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.username.is_empty() {
            missing.push(ENV_USERNAME);
        }
        if self.password.is_empty() {
            missing.push(ENV_PASSWORD);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(HomebridgeError::Configuration { missing })
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("reauth_on_unauthorized", &self.reauth_on_unauthorized)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_only_credentials_set() {
        let cfg = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "admin"),
            (ENV_PASSWORD, "secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert!(cfg.reauth_on_unauthorized);
        assert_eq!(cfg.timeout, None);
        cfg.validate().unwrap();
    }

    #[test]
    fn optional_settings_are_parsed() {
        let cfg = Config::from_lookup(lookup_from(&[
            (ENV_BASE_URL, "http://bridge:8581/"),
            (ENV_REAUTH, "off"),
            (ENV_TIMEOUT_SECS, "15"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "http://bridge:8581/");
        assert!(!cfg.reauth_on_unauthorized);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(
            err,
            HomebridgeError::InvalidConfig { key: ENV_TIMEOUT_SECS, .. }
        ));
    }

    #[test]
    fn bad_reauth_flag_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[(ENV_REAUTH, "maybe")])).unwrap_err();
        assert!(err.to_string().contains(ENV_REAUTH));
    }

    #[test]
    fn validate_lists_exactly_the_missing_credentials() {
        let cases = [
            ("", "", vec![ENV_USERNAME, ENV_PASSWORD]),
            ("", "pw", vec![ENV_USERNAME]),
            ("user", "", vec![ENV_PASSWORD]),
        ];
        for (user, pass, expected) in cases {
            let err = Config::new(user, pass).validate().unwrap_err();
            assert_eq!(err.missing_variables(), expected.as_slice(), "user={user:?} pass={pass:?}");
        }
        Config::new("user", "pw").validate().unwrap();
    }

    #[test]
    fn unset_credentials_are_reported_by_validate() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.missing_variables(), &[ENV_USERNAME, ENV_PASSWORD]);
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", Config::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
