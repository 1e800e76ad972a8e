//! Outbound authentication requests.
//!
//! A [`RequestBuilder`] performs discovery on a user-supplied identifier and
//! produces an [`AuthenticationRequest`] addressed to the discovered
//! provider endpoint. The relying party supplies the builder with a
//! [`RequestBuildContext`] carrying everything it resolved beforehand.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use openid_rp_storage::RelyingPartyStore;
use url::Url;

use crate::{
    channel::Channel,
    error::Result,
    identifier::Identifier,
    protocol::{Protocol, ProtocolVersion, mode},
    query::QueryParameters,
    realm::Realm,
    settings::RelyingPartySettings,
};

/// Whether the provider may interact with the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthenticationMode {
    /// The provider may show pages to the user.
    #[default]
    Setup,
    /// The provider must answer without user interaction.
    Immediate,
}

impl AuthenticationMode {
    /// Value sent in `openid.mode`.
    #[must_use]
    pub fn as_mode_str(self) -> &'static str {
        match self {
            Self::Setup => mode::CHECKID_SETUP,
            Self::Immediate => mode::CHECKID_IMMEDIATE,
        }
    }
}

/// An authentication request ready to be sent to a provider.
#[derive(Debug, Clone, bon::Builder)]
pub struct AuthenticationRequest {
    /// Protocol revision the provider endpoint speaks.
    pub protocol: Protocol,
    /// Provider endpoint the user agent is redirected to.
    pub provider_endpoint: Url,
    /// Identifier the user claims to own.
    pub claimed_identifier: Identifier,
    /// Identifier the provider knows the user by, when it differs from the
    /// claimed identifier.
    #[builder(into)]
    pub local_identifier: Option<String>,
    /// Realm the user is asked to trust.
    pub realm: Realm,
    /// Address the provider sends the user agent back to.
    pub return_to: Url,
    /// Interactive or immediate.
    #[builder(default)]
    pub mode: AuthenticationMode,
    /// Extension parameters appended to the request.
    #[builder(default)]
    pub extension_arguments: QueryParameters,
}

impl AuthenticationRequest {
    /// Encodes the request as the URL the user agent should be redirected to.
    ///
    /// Use [`Channel::requires_form_post`] on the result to decide whether
    /// the message is short enough to send as a redirect.
    #[must_use]
    pub fn redirect_url(&self, channel: &Channel) -> Url {
        let claimed = self.claimed_identifier.to_string();
        let identity = self.local_identifier.as_deref().unwrap_or(&claimed);
        let realm = self.realm.to_string();

        let mut fields: Vec<(&str, &str)> = Vec::with_capacity(6 + self.extension_arguments.len());
        if let Some(ns) = self.protocol.namespace() {
            fields.push((self.protocol.ns_key(), ns));
        }
        fields.push((self.protocol.mode_key(), self.mode.as_mode_str()));
        if self.protocol.version() == ProtocolVersion::V20 {
            fields.push(("openid.claimed_id", claimed.as_str()));
        }
        fields.push(("openid.identity", identity));
        fields.push(("openid.return_to", self.return_to.as_str()));
        fields.push((self.protocol.realm_key(), realm.as_str()));
        fields.extend(self.extension_arguments.iter());

        channel.encode_indirect(&self.provider_endpoint, fields)
    }
}

/// Everything a [`RequestBuilder`] needs to produce a request.
#[derive(Clone, Copy)]
pub struct RequestBuildContext<'a> {
    /// The identifier to run discovery on.
    pub identifier: &'a Identifier,
    /// Realm to place in the request.
    pub realm: &'a Realm,
    /// Return address to place in the request.
    pub return_to: &'a Url,
    /// Interactive or immediate.
    pub mode: AuthenticationMode,
    /// Association store, or `None` for a stateless relying party.
    pub store: Option<&'a Arc<dyn RelyingPartyStore>>,
    /// Channel used to encode messages sent to the provider.
    pub channel: &'a Channel,
    /// Settings of the relying party issuing the request.
    pub settings: &'a RelyingPartySettings,
}

impl fmt::Debug for RequestBuildContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuildContext")
            .field("identifier", self.identifier)
            .field("realm", self.realm)
            .field("return_to", self.return_to)
            .field("mode", &self.mode)
            .field("stateless", &self.store.is_none())
            .field("channel", self.channel)
            .field("settings", self.settings)
            .finish()
    }
}

/// Performs discovery and builds authentication requests.
///
/// Implementations may negotiate an association with the provider through
/// [`RequestBuildContext::store`] before returning.
#[async_trait]
pub trait RequestBuilder: Send + Sync {
    /// Builds a request for `context.identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::DiscoveryFailed`] if no OpenID endpoint
    /// is found, and may propagate storage or protocol errors raised while
    /// associating.
    ///
    /// [`RelyingPartyError::DiscoveryFailed`]: crate::RelyingPartyError::DiscoveryFailed
    async fn build(&self, context: RequestBuildContext<'_>) -> Result<AuthenticationRequest>;
}
