//! The relying-party session orchestrator.
//!
//! A [`RelyingParty`] is created for each inbound request. It holds a
//! snapshot of that request, decides whether the request carries a provider
//! response, parses it at most once, and builds new authentication requests
//! with a realm and return address reconciled against the request.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use openid_rp::{
//!     AuthenticationResponse, AuthenticationStatus, Identifier, QueryParameters, RelyingParty,
//! };
//! use openid_rp::testutil::{CountingResponseParser, StubRequestBuilder};
//! use url::Url;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("https://rp.example/login?openid.mode=cancel")?;
//! let rp = RelyingParty::builder()
//!     .request_url(url.clone())
//!     .query(QueryParameters::from_url(&url))
//!     .request_builder(Arc::new(StubRequestBuilder::new()))
//!     .response_parser(Arc::new(CountingResponseParser::new(Ok(
//!         AuthenticationResponse::canceled(),
//!     ))))
//!     .build()
//!     .await?;
//!
//! let response = rp.response().await.expect("request carries a response");
//! assert_eq!(response.status, AuthenticationStatus::Canceled);
//! # Ok(())
//! # }
//! ```

use std::{fmt, sync::Arc};

use fail::fail_point;
use openid_rp_storage::{MemoryRelyingPartyStore, RelyingPartyStore};
use tokio::sync::OnceCell;
use url::Url;

use crate::{
    application::ApplicationState,
    channel::Channel,
    error::{ProtocolError, RelyingPartyError, Result},
    identifier::Identifier,
    protocol::Protocol,
    query::QueryParameters,
    realm::Realm,
    request::{AuthenticationMode, AuthenticationRequest, RequestBuildContext, RequestBuilder},
    response::{AuthenticationResponse, ResponseParser},
    return_to::compute_return_to,
    settings::RelyingPartySettings,
};

/// The inbound request a relying party was created for.
#[derive(Debug, Clone)]
struct RequestSnapshot {
    url: Url,
    query: QueryParameters,
}

/// Per-request orchestrator for OpenID authentication.
///
/// Without a store the relying party is stateless: it never associates with
/// providers and asks them to verify each assertion directly.
pub struct RelyingParty {
    store: Option<Arc<dyn RelyingPartyStore>>,
    request: Option<RequestSnapshot>,
    application_path: String,
    channel: Channel,
    settings: RelyingPartySettings,
    request_builder: Arc<dyn RequestBuilder>,
    response_parser: Arc<dyn ResponseParser>,
    response: OnceCell<Option<AuthenticationResponse>>,
}

#[bon::bon]
impl RelyingParty {
    /// Creates a relying party for one inbound request.
    ///
    /// `request_url` and `query` describe the inbound request and must be
    /// supplied together; omit both to only create requests. When a store
    /// is supplied, its expired entries are purged before this returns. A
    /// failed purge is logged and does not fail construction.
    ///
    /// # Errors
    ///
    /// - [`RelyingPartyError::InvalidArgument`] if only one of `request_url` and `query` is
    ///   supplied
    /// - [`RelyingPartyError::Configuration`] if `settings` are invalid
    #[builder]
    pub async fn new(
        store: Option<Arc<dyn RelyingPartyStore>>,
        request_url: Option<Url>,
        query: Option<QueryParameters>,
        #[builder(into, default = String::from("/"))] application_path: String,
        #[builder(default)] settings: RelyingPartySettings,
        #[builder(default)] channel: Channel,
        request_builder: Arc<dyn RequestBuilder>,
        response_parser: Arc<dyn ResponseParser>,
    ) -> Result<Self> {
        let request = match (request_url, query) {
            (Some(url), Some(query)) => Some(RequestSnapshot { url, query }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(RelyingPartyError::InvalidArgument(
                    "a query is required when a request URL is supplied".into(),
                ));
            },
            (None, Some(_)) => {
                return Err(RelyingPartyError::InvalidArgument(
                    "a request URL is required when a query is supplied".into(),
                ));
            },
        };
        settings.validate()?;

        let relying_party = Self {
            store,
            request,
            application_path,
            channel,
            settings,
            request_builder,
            response_parser,
            response: OnceCell::new(),
        };
        relying_party.initialize().await;
        Ok(relying_party)
    }

    #[tracing::instrument(
        name = "relying_party_init",
        skip(self),
        fields(stateless = self.store.is_none(), has_request = self.request.is_some())
    )]
    async fn initialize(&self) {
        let Some(store) = &self.store else {
            tracing::debug!("No store supplied; operating in stateless mode");
            return;
        };
        tracing::debug!("Store supplied; operating in stateful mode");

        match store.purge_expired().await {
            Ok(report) => tracing::debug!(
                associations = report.associations,
                nonces = report.nonces,
                "Purged expired store entries"
            ),
            Err(error) => tracing::warn!(error = %error, "Store housekeeping failed; continuing"),
        }
    }

    /// Returns `true` if no store was supplied.
    #[must_use]
    pub fn is_stateless(&self) -> bool {
        self.store.is_none()
    }

    /// Returns the association and nonce store, if any.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn RelyingPartyStore>> {
        self.store.as_ref()
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &RelyingPartySettings {
        &self.settings
    }

    /// Returns the channel used to encode outbound messages.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the URL of the inbound request, if one was supplied.
    #[must_use]
    pub fn request_url(&self) -> Option<&Url> {
        self.request.as_ref().map(|snapshot| &snapshot.url)
    }

    /// Returns the parameters of the inbound request, if one was supplied.
    #[must_use]
    pub fn query(&self) -> Option<&QueryParameters> {
        self.request.as_ref().map(|snapshot| &snapshot.query)
    }

    /// Returns `true` if the inbound request carries a protocol message.
    #[must_use]
    pub fn is_response_ready(&self) -> bool {
        self.request.as_ref().is_some_and(|snapshot| carries_message(&snapshot.query))
    }

    /// Returns the provider's response to an earlier authentication request.
    ///
    /// Returns `None` when the inbound request carries no protocol message.
    /// The response is parsed on the first call and cached; parser failures
    /// are reported as a [`Failed`](crate::AuthenticationStatus::Failed)
    /// response rather than an error.
    #[tracing::instrument(skip(self))]
    pub async fn response(&self) -> Option<&AuthenticationResponse> {
        if let Some(cached) = self.response.get() {
            tracing::debug!(present = cached.is_some(), "Returning memoized response");
            return cached.as_ref();
        }
        self.response.get_or_init(|| self.parse_response()).await.as_ref()
    }

    async fn parse_response(&self) -> Option<AuthenticationResponse> {
        let snapshot = self.request.as_ref()?;
        if !carries_message(&snapshot.query) {
            tracing::debug!("Inbound request carries no protocol message");
            return None;
        }

        let response = match self.invoke_parser(snapshot).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(error = %error, "Response parsing failed; reporting failed authentication");
                AuthenticationResponse::failed(error)
                    .with_protocol(Protocol::detect(&snapshot.query).version())
            },
        };
        tracing::debug!(status = %response.status, "Parsed authentication response");
        Some(response)
    }

    async fn invoke_parser(
        &self,
        snapshot: &RequestSnapshot,
    ) -> std::result::Result<AuthenticationResponse, ProtocolError> {
        fail_point!("rp-before-response-parse", |_| {
            Err(ProtocolError::new("injected failure before response parse"))
        });
        self.response_parser.parse(&snapshot.query, self.store.as_ref(), &snapshot.url).await
    }

    /// Derives the realm from the inbound request and the application path.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::ContextUnavailable`] if there is no
    /// inbound request.
    pub fn default_realm(&self) -> Result<Realm> {
        let snapshot = self.snapshot()?;
        Ok(Realm::auto_detect(&snapshot.url, &self.application_path))
    }

    /// Computes the return address for `realm` from the inbound request.
    ///
    /// See [`compute_return_to`] for the reconciliation rules.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::ContextUnavailable`] if there is no
    /// inbound request.
    pub fn return_to(&self, realm: &Realm) -> Result<Url> {
        let snapshot = self.snapshot()?;
        Ok(compute_return_to(realm, &snapshot.url, &self.settings.session_token_key))
    }

    fn snapshot(&self) -> Result<&RequestSnapshot> {
        self.request.as_ref().ok_or_else(|| {
            RelyingPartyError::ContextUnavailable(
                "no inbound request; supply the realm and return address explicitly".into(),
            )
        })
    }

    /// Creates an interactive authentication request with an explicit realm
    /// and return address.
    ///
    /// # Errors
    ///
    /// - [`RelyingPartyError::SslRequired`] if SSL is required and a URL is not HTTPS
    /// - Any error raised by the request builder, typically
    ///   [`RelyingPartyError::DiscoveryFailed`]
    #[tracing::instrument(skip_all, fields(identifier = %identifier, realm = %realm))]
    pub async fn create_request(
        &self,
        identifier: &Identifier,
        realm: &Realm,
        return_to: &Url,
    ) -> Result<AuthenticationRequest> {
        self.build_request(identifier, realm, return_to, AuthenticationMode::Setup).await
    }

    /// Creates an immediate authentication request, asking the provider to
    /// answer without interacting with the user.
    ///
    /// # Errors
    ///
    /// Same as [`create_request`](Self::create_request).
    #[tracing::instrument(skip_all, fields(identifier = %identifier, realm = %realm))]
    pub async fn create_immediate_request(
        &self,
        identifier: &Identifier,
        realm: &Realm,
        return_to: &Url,
    ) -> Result<AuthenticationRequest> {
        self.build_request(identifier, realm, return_to, AuthenticationMode::Immediate).await
    }

    /// Creates an authentication request whose return address is computed
    /// from the inbound request.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::ContextUnavailable`] if there is no
    /// inbound request, otherwise the same errors as
    /// [`create_request`](Self::create_request).
    #[tracing::instrument(skip_all, fields(identifier = %identifier, realm = %realm))]
    pub async fn create_request_with_realm(
        &self,
        identifier: &Identifier,
        realm: &Realm,
    ) -> Result<AuthenticationRequest> {
        let return_to = self.return_to(realm)?;
        self.build_request(identifier, realm, &return_to, AuthenticationMode::Setup).await
    }

    /// Creates an authentication request whose realm and return address are
    /// both computed from the inbound request.
    ///
    /// # Errors
    ///
    /// Same as [`create_request_with_realm`](Self::create_request_with_realm).
    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    pub async fn create_request_default(
        &self,
        identifier: &Identifier,
    ) -> Result<AuthenticationRequest> {
        let realm = self.default_realm()?;
        let return_to = self.return_to(&realm)?;
        self.build_request(identifier, &realm, &return_to, AuthenticationMode::Setup).await
    }

    async fn build_request(
        &self,
        identifier: &Identifier,
        realm: &Realm,
        return_to: &Url,
        mode: AuthenticationMode,
    ) -> Result<AuthenticationRequest> {
        if self.settings.require_ssl {
            ensure_secure(identifier, realm, return_to)?;
        }
        if !realm.contains(return_to) {
            tracing::warn!(
                return_to = %return_to,
                "Return address is not covered by the realm; the provider may reject it"
            );
        }

        let context = RequestBuildContext {
            identifier,
            realm,
            return_to,
            mode,
            store: self.store.as_ref(),
            channel: &self.channel,
            settings: &self.settings,
        };
        let request = self.request_builder.build(context).await?;
        tracing::debug!(
            provider = %request.provider_endpoint,
            protocol = %request.protocol.version(),
            "Built authentication request"
        );
        Ok(request)
    }

    /// Returns the application-wide default store, creating an in-memory
    /// store on first use.
    ///
    /// # Errors
    ///
    /// - [`RelyingPartyError::ContextUnavailable`] if `state` is `None`
    /// - [`RelyingPartyError::Configuration`] if another kind of value is published under
    ///   [`APPLICATION_STORE_KEY`](crate::APPLICATION_STORE_KEY)
    pub fn application_store(
        state: Option<&ApplicationState>,
    ) -> Result<Arc<dyn RelyingPartyStore>> {
        Self::application_store_with(state, || Arc::new(MemoryRelyingPartyStore::new()))
    }

    /// Returns the application-wide store, creating it with `factory` on
    /// first use.
    ///
    /// # Errors
    ///
    /// Same as [`application_store`](Self::application_store).
    pub fn application_store_with<F>(
        state: Option<&ApplicationState>,
        factory: F,
    ) -> Result<Arc<dyn RelyingPartyStore>>
    where
        F: FnOnce() -> Arc<dyn RelyingPartyStore>,
    {
        let state = state.ok_or_else(|| {
            RelyingPartyError::ContextUnavailable(
                "no application state available to hold the default store".into(),
            )
        })?;
        state.store_or_init(factory)
    }
}

fn carries_message(query: &QueryParameters) -> bool {
    query.contains_key(Protocol::detect(query).mode_key())
}

fn ensure_secure(identifier: &Identifier, realm: &Realm, return_to: &Url) -> Result<()> {
    if !identifier.is_secure() {
        return Err(RelyingPartyError::SslRequired(format!("identifier {identifier} is not HTTPS")));
    }
    if !realm.is_secure() {
        return Err(RelyingPartyError::SslRequired(format!("realm {realm} is not HTTPS")));
    }
    if return_to.scheme() != "https" {
        return Err(RelyingPartyError::SslRequired(format!(
            "return address {return_to} is not HTTPS"
        )));
    }
    Ok(())
}

impl fmt::Debug for RelyingParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelyingParty")
            .field("stateless", &self.is_stateless())
            .field("request_url", &self.request_url())
            .field("application_path", &self.application_path)
            .field("channel", &self.channel)
            .field("settings", &self.settings)
            .field("response_parsed", &self.response.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{
        AuthenticationStatus,
        testutil::{CountingResponseParser, StubRequestBuilder},
    };

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn relying_party(request_url: Option<&str>) -> RelyingParty {
        let request_url = request_url.map(url);
        let query = request_url.as_ref().map(QueryParameters::from_url);
        RelyingParty::builder()
            .maybe_request_url(request_url)
            .maybe_query(query)
            .request_builder(Arc::new(StubRequestBuilder::new()))
            .response_parser(Arc::new(CountingResponseParser::new(Ok(
                AuthenticationResponse::canceled(),
            ))))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_without_url_rejected() {
        let result = RelyingParty::builder()
            .query(QueryParameters::new())
            .request_builder(Arc::new(StubRequestBuilder::new()))
            .response_parser(Arc::new(CountingResponseParser::new(Ok(
                AuthenticationResponse::canceled(),
            ))))
            .build()
            .await;
        assert!(matches!(result, Err(RelyingPartyError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let result = RelyingParty::builder()
            .settings(RelyingPartySettings::builder().session_token_key("openid.x").build())
            .request_builder(Arc::new(StubRequestBuilder::new()))
            .response_parser(Arc::new(CountingResponseParser::new(Ok(
                AuthenticationResponse::canceled(),
            ))))
            .build()
            .await;
        assert!(matches!(result, Err(RelyingPartyError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_no_request_means_no_response() {
        let rp = relying_party(None).await;
        assert!(!rp.is_response_ready());
        assert!(rp.response().await.is_none());
        assert!(rp.is_stateless());
        assert!(matches!(rp.default_realm(), Err(RelyingPartyError::ContextUnavailable(_))));
    }

    #[tokio::test]
    async fn test_openid2_mode_detection() {
        let rp = relying_party(Some(
            "http://rp.example/?openid.ns=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0&openid.mode=cancel",
        ))
        .await;
        assert!(rp.is_response_ready());
        assert_eq!(rp.response().await.map(|r| r.status), Some(AuthenticationStatus::Canceled));
    }

    #[tokio::test]
    async fn test_default_realm_uses_application_path() {
        let rp = RelyingParty::builder()
            .request_url(url("http://rp.example/site/login.aspx?x=1"))
            .query(QueryParameters::new())
            .application_path("/site")
            .request_builder(Arc::new(StubRequestBuilder::new()))
            .response_parser(Arc::new(CountingResponseParser::new(Ok(
                AuthenticationResponse::canceled(),
            ))))
            .build()
            .await
            .unwrap();

        assert_eq!(rp.default_realm().unwrap().to_string(), "http://rp.example/site/");
    }

    #[test]
    fn test_ensure_secure() {
        let secure_id = Identifier::parse("https://alice.example/").unwrap();
        let secure_realm = Realm::parse("https://rp.example/").unwrap();
        let secure_return = url("https://rp.example/cb");

        assert!(ensure_secure(&secure_id, &secure_realm, &secure_return).is_ok());
        assert!(
            ensure_secure(
                &Identifier::parse("alice.example").unwrap(),
                &secure_realm,
                &secure_return
            )
            .is_err()
        );
        assert!(
            ensure_secure(&secure_id, &Realm::parse("http://rp.example/").unwrap(), &secure_return)
                .is_err()
        );
        assert!(ensure_secure(&secure_id, &secure_realm, &url("http://rp.example/cb")).is_err());
    }

    #[test]
    fn test_application_store_requires_state() {
        let result = RelyingParty::application_store(None);
        assert!(matches!(result, Err(RelyingPartyError::ContextUnavailable(_))));

        let state = ApplicationState::new();
        let first = RelyingParty::application_store(Some(&state)).unwrap();
        let second = RelyingParty::application_store(Some(&state)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
