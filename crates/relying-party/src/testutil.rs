//! Shared test utilities for relying-party testing.
//!
//! This module provides stand-ins for the collaborators a
//! [`RelyingParty`](crate::RelyingParty) delegates to, plus a canned
//! "fetch by URI" registry for exercising discovery without a network. It
//! is feature-gated behind `testutil` to prevent leaking into production
//! builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! openid-rp = { path = "../relying-party", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use openid_rp::testutil::{CountingResponseParser, MockFetcher, StubRequestBuilder};
//! ```

use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use openid_rp_storage::RelyingPartyStore;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use url::Url;

use crate::{
    error::{ProtocolError, RelyingPartyError, Result},
    identifier::Identifier,
    protocol::Protocol,
    query::QueryParameters,
    realm::Realm,
    request::{AuthenticationMode, AuthenticationRequest, RequestBuildContext, RequestBuilder},
    response::{AuthenticationResponse, ResponseParser},
};

/// Provider endpoint used by [`StubRequestBuilder::new`].
pub const TEST_PROVIDER_ENDPOINT: &str = "https://op.example/server";

/// Maximum redirects [`MockFetcher`] follows before giving up.
pub const MAX_REDIRECTS: usize = 10;

// ---------------------------------------------------------------------------
// Response parser stub
// ---------------------------------------------------------------------------

/// A [`ResponseParser`] that returns a fixed result and counts invocations.
///
/// Successful responses without callback arguments get the non-protocol
/// parameters of the parsed query, as a real parser would report them.
#[derive(Debug)]
pub struct CountingResponseParser {
    result: std::result::Result<AuthenticationResponse, ProtocolError>,
    calls: AtomicUsize,
    last_query: Mutex<Option<QueryParameters>>,
    last_store_present: Mutex<Option<bool>>,
}

impl CountingResponseParser {
    /// Creates a parser that always returns `result`.
    #[must_use]
    pub fn new(result: std::result::Result<AuthenticationResponse, ProtocolError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
            last_store_present: Mutex::new(None),
        }
    }

    /// Creates a parser that authenticates `claimed_identifier`.
    #[must_use]
    pub fn authenticating(claimed_identifier: &str) -> Self {
        let identifier =
            Identifier::parse(claimed_identifier).expect("test identifier must be valid");
        Self::new(Ok(AuthenticationResponse::authenticated(identifier)))
    }

    /// Creates a parser that fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self::new(Err(ProtocolError::new(message)))
    }

    /// Number of times [`parse`](ResponseParser::parse) was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The query passed to the most recent call.
    #[must_use]
    pub fn last_query(&self) -> Option<QueryParameters> {
        self.last_query.lock().clone()
    }

    /// Whether the most recent call received a store.
    #[must_use]
    pub fn last_store_present(&self) -> Option<bool> {
        *self.last_store_present.lock()
    }
}

#[async_trait]
impl ResponseParser for CountingResponseParser {
    async fn parse(
        &self,
        query: &QueryParameters,
        store: Option<&Arc<dyn RelyingPartyStore>>,
        _request_url: &Url,
    ) -> std::result::Result<AuthenticationResponse, ProtocolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.clone());
        *self.last_store_present.lock() = Some(store.is_some());

        let mut response = self.result.clone()?;
        if response.callback_arguments.is_empty() {
            response.callback_arguments = query.filtered(|key| !Protocol::is_reserved_key(key));
        }
        if response.protocol.is_none() {
            response.protocol = Some(Protocol::detect(query).version());
        }
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Request builder stub
// ---------------------------------------------------------------------------

/// What a [`StubRequestBuilder`] was asked to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuild {
    /// Identifier discovery would have run on.
    pub identifier: Identifier,
    /// Realm supplied by the relying party.
    pub realm: Realm,
    /// Return address supplied by the relying party.
    pub return_to: Url,
    /// Requested mode.
    pub mode: AuthenticationMode,
    /// Whether a store was supplied.
    pub store_present: bool,
    /// Authentication time budget from the relying party settings.
    pub maximum_authentication_time: Duration,
}

/// A [`RequestBuilder`] that skips discovery and addresses every request
/// to a fixed provider endpoint.
#[derive(Debug)]
pub struct StubRequestBuilder {
    provider_endpoint: Url,
    discovery_failure: Option<String>,
    calls: AtomicUsize,
    last_build: Mutex<Option<RecordedBuild>>,
}

impl Default for StubRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRequestBuilder {
    /// Creates a builder targeting [`TEST_PROVIDER_ENDPOINT`].
    #[must_use]
    pub fn new() -> Self {
        let endpoint = Url::parse(TEST_PROVIDER_ENDPOINT).expect("constant endpoint is valid");
        Self::with_endpoint(endpoint)
    }

    /// Creates a builder targeting `provider_endpoint`.
    #[must_use]
    pub fn with_endpoint(provider_endpoint: Url) -> Self {
        Self {
            provider_endpoint,
            discovery_failure: None,
            calls: AtomicUsize::new(0),
            last_build: Mutex::new(None),
        }
    }

    /// Creates a builder whose discovery always fails with `message`.
    #[must_use]
    pub fn failing_discovery(message: &str) -> Self {
        Self { discovery_failure: Some(message.to_owned()), ..Self::new() }
    }

    /// Number of times [`build`](RequestBuilder::build) was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent call.
    #[must_use]
    pub fn last_build(&self) -> Option<RecordedBuild> {
        self.last_build.lock().clone()
    }
}

#[async_trait]
impl RequestBuilder for StubRequestBuilder {
    async fn build(&self, context: RequestBuildContext<'_>) -> Result<AuthenticationRequest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_build.lock() = Some(RecordedBuild {
            identifier: context.identifier.clone(),
            realm: context.realm.clone(),
            return_to: context.return_to.clone(),
            mode: context.mode,
            store_present: context.store.is_some(),
            maximum_authentication_time: context.settings.maximum_authentication_time,
        });

        if let Some(message) = &self.discovery_failure {
            return Err(RelyingPartyError::discovery_failed(
                context.identifier.to_string(),
                message.clone(),
            ));
        }

        Ok(AuthenticationRequest::builder()
            .protocol(Protocol::V20)
            .provider_endpoint(self.provider_endpoint.clone())
            .claimed_identifier(context.identifier.clone())
            .realm(context.realm.clone())
            .return_to(context.return_to.clone())
            .mode(context.mode)
            .build())
    }
}

// ---------------------------------------------------------------------------
// Fetch harness
// ---------------------------------------------------------------------------

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// URL that was requested.
    pub requested_url: Url,
    /// URL the document was finally served from, after redirects.
    pub final_url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Content type of the body.
    pub content_type: String,
    /// Response body.
    pub body: String,
}

/// Errors raised while fetching.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The redirect chain exceeded [`MAX_REDIRECTS`].
    #[error("Too many redirects fetching {url}")]
    TooManyRedirects {
        /// The URL originally requested.
        url: Url,
    },

    /// The transport failed.
    #[error("Transport error fetching {url}: {message}")]
    Transport {
        /// The URL being fetched.
        url: Url,
        /// Description of the failure.
        message: String,
    },
}

/// Fetches documents by URI.
#[async_trait]
pub trait UriFetcher: Send + Sync {
    /// Fetches `url`, following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the transport fails or redirects loop.
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchResponse, FetchError>;
}

#[derive(Debug, Clone)]
enum CannedResponse {
    Document { status: u16, content_type: String, body: String },
    Redirect { location: Url },
    Failure { message: String },
}

/// A [`UriFetcher`] serving canned responses keyed by URI.
///
/// Unregistered URIs answer `404`. Fragments are ignored when matching.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: RwLock<HashMap<Url, CannedResponse>>,
    fetches: AtomicUsize,
}

impl MockFetcher {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` with status 200 at `url`.
    pub fn register_document(&self, url: &Url, content_type: &str, body: impl Into<String>) {
        self.register(
            url,
            CannedResponse::Document {
                status: 200,
                content_type: content_type.to_owned(),
                body: body.into(),
            },
        );
    }

    /// Serves an empty body with `status` at `url`.
    pub fn register_status(&self, url: &Url, status: u16) {
        self.register(
            url,
            CannedResponse::Document {
                status,
                content_type: "text/plain".to_owned(),
                body: String::new(),
            },
        );
    }

    /// Redirects `from` to `to`.
    pub fn register_redirect(&self, from: &Url, to: &Url) {
        self.register(from, CannedResponse::Redirect { location: to.clone() });
    }

    /// Makes fetching `url` fail at the transport level.
    pub fn register_failure(&self, url: &Url, message: &str) {
        self.register(url, CannedResponse::Failure { message: message.to_owned() });
    }

    /// Serves an HTML discovery document at `claimed` that names
    /// `provider_endpoint` as its OpenID 2.0 provider.
    pub fn register_openid2_document(
        &self,
        claimed: &Url,
        provider_endpoint: &Url,
        local_id: Option<&str>,
    ) {
        self.register_document(
            claimed,
            "text/html",
            openid2_discovery_html(provider_endpoint, local_id),
        );
    }

    /// Number of fetches served, counting each redirect hop.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn register(&self, url: &Url, response: CannedResponse) {
        self.responses.write().insert(without_fragment(url), response);
    }
}

#[async_trait]
impl UriFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchResponse, FetchError> {
        let mut current = without_fragment(url);
        for _ in 0..=MAX_REDIRECTS {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let canned = self.responses.read().get(&current).cloned();
            match canned {
                Some(CannedResponse::Redirect { location }) => {
                    current = without_fragment(&location);
                },
                Some(CannedResponse::Document { status, content_type, body }) => {
                    return Ok(FetchResponse {
                        requested_url: url.clone(),
                        final_url: current,
                        status,
                        content_type,
                        body,
                    });
                },
                Some(CannedResponse::Failure { message }) => {
                    return Err(FetchError::Transport { url: current, message });
                },
                None => {
                    return Ok(FetchResponse {
                        requested_url: url.clone(),
                        final_url: current,
                        status: 404,
                        content_type: "text/plain".to_owned(),
                        body: "Not Found".to_owned(),
                    });
                },
            }
        }
        Err(FetchError::TooManyRedirects { url: url.clone() })
    }
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Renders a minimal HTML page advertising an OpenID 2.0 provider.
#[must_use]
pub fn openid2_discovery_html(provider_endpoint: &Url, local_id: Option<&str>) -> String {
    let mut html = String::from("<html><head>\n");
    let _ = writeln!(html, r#"<link rel="openid2.provider" href="{provider_endpoint}">"#);
    if let Some(local_id) = local_id {
        let _ = writeln!(html, r#"<link rel="openid2.local_id" href="{local_id}">"#);
    }
    html.push_str("</head><body></body></html>\n");
    html
}

/// Returns the `href` of the first `<link>` tag whose `rel` is `rel`.
fn find_link_href(html: &str, rel: &str) -> Option<String> {
    let rel_attribute = format!(r#"rel="{rel}""#);
    html.split("<link").skip(1).find_map(|tag| {
        let tag = tag.split_once('>').map_or(tag, |(inside, _)| inside);
        if !tag.contains(&rel_attribute) {
            return None;
        }
        let (_, rest) = tag.split_once(r#"href=""#)?;
        rest.split_once('"').map(|(href, _)| href.to_owned())
    })
}

/// A [`RequestBuilder`] that discovers the provider through a
/// [`UriFetcher`] by reading HTML `<link>` tags.
#[derive(Debug)]
pub struct DiscoveringRequestBuilder<F> {
    fetcher: Arc<F>,
}

impl<F: UriFetcher> DiscoveringRequestBuilder<F> {
    /// Creates a builder fetching through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl<F: UriFetcher> RequestBuilder for DiscoveringRequestBuilder<F> {
    async fn build(&self, context: RequestBuildContext<'_>) -> Result<AuthenticationRequest> {
        let identifier = context.identifier.to_string();
        let Identifier::Uri(url) = context.identifier else {
            return Err(RelyingPartyError::discovery_failed(
                identifier,
                "XRI resolution is not supported",
            ));
        };

        let fetched = self.fetcher.fetch(url).await.map_err(|e| {
            RelyingPartyError::discovery_failed_with_source(&identifier, "fetch failed", e)
        })?;
        if fetched.status != 200 {
            return Err(RelyingPartyError::discovery_failed(
                identifier,
                format!("HTTP {} from {}", fetched.status, fetched.final_url),
            ));
        }

        let Some(endpoint) = find_link_href(&fetched.body, "openid2.provider") else {
            return Err(RelyingPartyError::discovery_failed(identifier, "no OpenID endpoint found"));
        };
        let provider_endpoint = Url::parse(&endpoint).map_err(|e| {
            RelyingPartyError::discovery_failed_with_source(
                &identifier,
                "provider endpoint is not a URL",
                e,
            )
        })?;

        Ok(AuthenticationRequest::builder()
            .protocol(Protocol::V20)
            .provider_endpoint(provider_endpoint)
            .claimed_identifier(Identifier::Uri(fetched.final_url))
            .maybe_local_identifier(find_link_href(&fetched.body, "openid2.local_id"))
            .realm(context.realm.clone())
            .return_to(context.return_to.clone())
            .mode(context.mode)
            .build())
    }
}

// ---------------------------------------------------------------------------
// Assertion macros
// ---------------------------------------------------------------------------

/// Asserts that a result is an `Err` matching the given
/// [`RelyingPartyError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use openid_rp::{RelyingPartyError, assert_rp_error};
///
/// let result: Result<(), RelyingPartyError> =
///     Err(RelyingPartyError::InvalidArgument("query is required".into()));
/// assert_rp_error!(result, InvalidArgument);
/// ```
#[macro_export]
macro_rules! assert_rp_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::RelyingPartyError::$variant { .. })),
            "expected RelyingPartyError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::RelyingPartyError::$variant { .. })),
            "{}: expected RelyingPartyError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
