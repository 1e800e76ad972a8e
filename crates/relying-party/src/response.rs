//! Inbound authentication responses.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use openid_rp_storage::RelyingPartyStore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::ProtocolError, identifier::Identifier, protocol::ProtocolVersion,
    query::QueryParameters,
};

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationStatus {
    /// The provider asserted the claimed identifier and the assertion verified.
    Authenticated,
    /// The user declined to authenticate.
    Canceled,
    /// The response was malformed, unverifiable, or an error reply.
    Failed,
    /// An immediate request could not complete without user interaction.
    SetupRequired,
}

impl fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authenticated => "authenticated",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::SetupRequired => "setup_required",
        })
    }
}

/// A decoded response to an authentication request.
#[derive(Debug, Clone)]
pub struct AuthenticationResponse {
    /// Outcome of the attempt.
    pub status: AuthenticationStatus,
    /// The verified identifier, present when authenticated.
    pub claimed_identifier: Option<Identifier>,
    /// A display form of the claimed identifier.
    pub friendly_identifier: Option<String>,
    /// Why the attempt failed, present when failed.
    pub error: Option<ProtocolError>,
    /// Protocol revision of the response message.
    pub protocol: Option<ProtocolVersion>,
    /// Non-protocol parameters carried back on the return address.
    pub callback_arguments: QueryParameters,
}

impl AuthenticationResponse {
    fn with_status(status: AuthenticationStatus) -> Self {
        Self {
            status,
            claimed_identifier: None,
            friendly_identifier: None,
            error: None,
            protocol: None,
            callback_arguments: QueryParameters::new(),
        }
    }

    /// A positive, verified assertion for `claimed_identifier`.
    #[must_use]
    pub fn authenticated(claimed_identifier: Identifier) -> Self {
        let friendly = friendly_form(&claimed_identifier);
        Self {
            claimed_identifier: Some(claimed_identifier),
            friendly_identifier: Some(friendly),
            ..Self::with_status(AuthenticationStatus::Authenticated)
        }
    }

    /// The user canceled.
    #[must_use]
    pub fn canceled() -> Self {
        Self::with_status(AuthenticationStatus::Canceled)
    }

    /// An immediate request needs user interaction.
    #[must_use]
    pub fn setup_required() -> Self {
        Self::with_status(AuthenticationStatus::SetupRequired)
    }

    /// The response could not be accepted.
    #[must_use]
    pub fn failed(error: ProtocolError) -> Self {
        Self { error: Some(error), ..Self::with_status(AuthenticationStatus::Failed) }
    }

    /// Records the protocol revision of the message.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Records the callback arguments carried on the return address.
    #[must_use]
    pub fn with_callback_arguments(mut self, callback_arguments: QueryParameters) -> Self {
        self.callback_arguments = callback_arguments;
        self
    }

    /// Returns a callback argument by key.
    #[must_use]
    pub fn callback_argument(&self, key: &str) -> Option<&str> {
        self.callback_arguments.get(key)
    }

    /// Returns `true` if the user was authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthenticationStatus::Authenticated
    }
}

/// Strips the scheme and a bare trailing slash from URI identifiers.
fn friendly_form(identifier: &Identifier) -> String {
    match identifier {
        Identifier::Uri(url) => {
            let text = url.as_str();
            let text = text.split_once("://").map_or(text, |(_, rest)| rest);
            if url.path() == "/" && url.query().is_none() {
                text.trim_end_matches('/').to_owned()
            } else {
                text.to_owned()
            }
        },
        Identifier::Xri(xri) => xri.clone(),
    }
}

/// Decodes and verifies inbound authentication responses.
///
/// Verification covers signature checks against a stored association (or a
/// direct check with the provider when stateless), nonce replay detection,
/// and discovery on the asserted identifier.
#[async_trait]
pub trait ResponseParser: Send + Sync {
    /// Parses the response carried by `query`, received at `request_url`.
    ///
    /// `store` is `None` for a stateless relying party.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the message is malformed or fails
    /// verification.
    async fn parse(
        &self,
        query: &QueryParameters,
        store: Option<&Arc<dyn RelyingPartyStore>>,
        request_url: &Url,
    ) -> Result<AuthenticationResponse, ProtocolError>;
}
