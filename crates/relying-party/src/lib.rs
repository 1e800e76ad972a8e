//! # OpenID Relying Party
//!
//! Session orchestration for web applications that accept OpenID logins.
//!
//! This crate provides:
//! - **[`RelyingParty`]**: the per-request orchestrator that detects and
//!   parses provider responses (once) and builds new authentication requests
//! - **Return-address reconciliation**: realm auto-detection, path case
//!   realignment, stale parameter stripping
//! - **Application-wide store**: a lazily created, process-wide association
//!   and nonce store held in an explicit [`ApplicationState`]
//! - **Protocol vocabulary**: [`Identifier`], [`Realm`], [`Protocol`],
//!   [`Channel`]
//!
//! Discovery and signature verification are delegated to the
//! [`RequestBuilder`] and [`ResponseParser`] traits.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use openid_rp::{
//!     ApplicationState, Identifier, QueryParameters, RelyingParty, RequestBuilder, ResponseParser,
//! };
//! use url::Url;
//!
//! # async fn example(
//! #     app: &ApplicationState,
//! #     builder: Arc<dyn RequestBuilder>,
//! #     parser: Arc<dyn ResponseParser>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("https://rp.example/login")?;
//! let rp = RelyingParty::builder()
//!     .store(RelyingParty::application_store(Some(app))?)
//!     .request_url(url.clone())
//!     .query(QueryParameters::from_url(&url))
//!     .request_builder(builder)
//!     .response_parser(parser)
//!     .build()
//!     .await?;
//!
//! match rp.response().await {
//!     Some(response) if response.is_authenticated() => {
//!         println!("welcome {:?}", response.friendly_identifier);
//!     },
//!     Some(response) => println!("login {}", response.status),
//!     None => {
//!         let request = rp.create_request_default(&Identifier::parse("alice.example")?).await?;
//!         println!("redirect to {}", request.redirect_url(rp.channel()));
//!     },
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with stub collaborators, a canned fetch
//!   registry, and assertion macros.
//! - **`failpoints`**: Activates `fail` crate fail points for fault-injection tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Application-wide shared state.
pub mod application;
/// Wire encoding.
pub mod channel;
/// Relying-party error types.
pub mod error;
/// User-supplied identifiers.
pub mod identifier;
/// Protocol versions and vocabulary.
pub mod protocol;
/// Request parameter collections.
pub mod query;
/// Realms.
pub mod realm;
/// The session orchestrator.
pub mod relying_party;
/// Outbound authentication requests.
pub mod request;
/// Inbound authentication responses.
pub mod response;
/// Return-address computation.
pub mod return_to;
/// Settings.
pub mod settings;
/// Test helpers.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export key types for convenience
pub use application::{APPLICATION_STORE_KEY, ApplicationState};
pub use channel::{Channel, DEFAULT_MAX_INDIRECT_MESSAGE_LENGTH};
pub use error::{ProtocolError, RelyingPartyError, Result};
pub use identifier::Identifier;
pub use openid_rp_storage as storage;
pub use protocol::{PARAMETER_PREFIX, Protocol, ProtocolVersion};
pub use query::QueryParameters;
pub use realm::Realm;
pub use relying_party::RelyingParty;
pub use request::{AuthenticationMode, AuthenticationRequest, RequestBuildContext, RequestBuilder};
pub use response::{AuthenticationResponse, AuthenticationStatus, ResponseParser};
pub use return_to::compute_return_to;
pub use settings::{
    DEFAULT_MAXIMUM_AUTHENTICATION_TIME, DEFAULT_SESSION_TOKEN_KEY, RelyingPartySettings,
};
