//! Relying-party settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{RelyingPartyError, Result},
    protocol::Protocol,
};

/// Default query key the relying party uses to tie a response to the
/// session that issued the request.
pub const DEFAULT_SESSION_TOKEN_KEY: &str = "openid_rp.session";

/// Default time allowed between sending a request and receiving the
/// assertion (5 minutes).
pub const DEFAULT_MAXIMUM_AUTHENTICATION_TIME: Duration = Duration::from_secs(5 * 60);

/// Behavior switches for a [`RelyingParty`](crate::RelyingParty).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use openid_rp::RelyingPartySettings;
///
/// let settings = RelyingPartySettings::builder()
///     .require_ssl(true)
///     .maximum_authentication_time(Duration::from_secs(120))
///     .build();
/// assert!(settings.validate().is_ok());
/// assert_eq!(settings.session_token_key, "openid_rp.session");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct RelyingPartySettings {
    /// Query key carrying the relying party's own session token.
    ///
    /// It is stripped from computed return addresses so it is never echoed
    /// back to the provider.
    #[serde(default = "default_session_token_key")]
    #[builder(into, default = DEFAULT_SESSION_TOKEN_KEY.to_owned())]
    pub session_token_key: String,

    /// Refuse to build requests involving non-HTTPS identifiers, realms, or
    /// return addresses.
    #[serde(default)]
    #[builder(default)]
    pub require_ssl: bool,

    /// Time allowed between sending a request and receiving its assertion.
    #[serde(with = "humantime_serde", default = "default_maximum_authentication_time")]
    #[builder(default = DEFAULT_MAXIMUM_AUTHENTICATION_TIME)]
    pub maximum_authentication_time: Duration,
}

fn default_session_token_key() -> String {
    DEFAULT_SESSION_TOKEN_KEY.to_owned()
}

fn default_maximum_authentication_time() -> Duration {
    DEFAULT_MAXIMUM_AUTHENTICATION_TIME
}

impl Default for RelyingPartySettings {
    fn default() -> Self {
        Self {
            session_token_key: default_session_token_key(),
            require_ssl: false,
            maximum_authentication_time: DEFAULT_MAXIMUM_AUTHENTICATION_TIME,
        }
    }
}

impl RelyingPartySettings {
    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::Configuration`] if the session token key
    /// is empty or lies in the protocol's reserved `openid.` namespace, or if
    /// the maximum authentication time is zero.
    pub fn validate(&self) -> Result<()> {
        if self.session_token_key.is_empty() {
            return Err(RelyingPartyError::Configuration(
                "session_token_key must not be empty".into(),
            ));
        }
        if Protocol::is_reserved_key(&self.session_token_key) {
            return Err(RelyingPartyError::Configuration(format!(
                "session_token_key '{}' collides with the reserved 'openid.' namespace",
                self.session_token_key
            )));
        }
        if self.maximum_authentication_time.is_zero() {
            return Err(RelyingPartyError::Configuration(
                "maximum_authentication_time must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default_impl() {
        assert_eq!(RelyingPartySettings::builder().build(), RelyingPartySettings::default());
    }

    #[test]
    fn test_deserialization_with_defaults() {
        let settings: RelyingPartySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, RelyingPartySettings::default());
    }

    #[test]
    fn test_deserialization_humantime() {
        let settings: RelyingPartySettings = serde_json::from_str(
            r#"{ "session_token_key": "sid", "require_ssl": true, "maximum_authentication_time": "90s" }"#,
        )
        .unwrap();
        assert_eq!(settings.session_token_key, "sid");
        assert!(settings.require_ssl);
        assert_eq!(settings.maximum_authentication_time, Duration::from_secs(90));
    }

    #[test]
    fn test_deserialization_rejects_unknown_fields() {
        assert!(serde_json::from_str::<RelyingPartySettings>(r#"{ "ssl": true }"#).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(RelyingPartySettings::default().validate().is_ok());

        let empty_key = RelyingPartySettings::builder().session_token_key("").build();
        assert!(matches!(empty_key.validate(), Err(RelyingPartyError::Configuration(_))));

        let reserved_key = RelyingPartySettings::builder().session_token_key("openid.sid").build();
        assert!(matches!(reserved_key.validate(), Err(RelyingPartyError::Configuration(_))));

        let zero_time =
            RelyingPartySettings::builder().maximum_authentication_time(Duration::ZERO).build();
        assert!(matches!(zero_time.validate(), Err(RelyingPartyError::Configuration(_))));
    }
}
