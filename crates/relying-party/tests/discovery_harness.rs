//! Request creation through a discovering request builder backed by the
//! canned fetch registry.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use openid_rp::{
    Identifier, QueryParameters, Realm, RelyingParty, RelyingPartyError, assert_rp_error,
    testutil::{CountingResponseParser, DiscoveringRequestBuilder, MAX_REDIRECTS, MockFetcher},
};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

async fn relying_party(fetcher: Arc<MockFetcher>) -> RelyingParty {
    let request_url = url("https://rp.example/login?returning=1");
    RelyingParty::builder()
        .query(QueryParameters::from_url(&request_url))
        .request_url(request_url)
        .request_builder(Arc::new(DiscoveringRequestBuilder::new(fetcher)))
        .response_parser(Arc::new(CountingResponseParser::failing("unused")))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn discovers_provider_through_redirects() {
    let fetcher = Arc::new(MockFetcher::new());
    let typed = url("http://alice.example/");
    let canonical = url("https://alice.example/");
    let provider = url("https://op.example/server");
    fetcher.register_redirect(&typed, &canonical);
    fetcher.register_openid2_document(&canonical, &provider, Some("https://op.example/u/alice"));

    let rp = relying_party(Arc::clone(&fetcher)).await;
    let request =
        rp.create_request_default(&Identifier::parse("alice.example").unwrap()).await.unwrap();

    assert_eq!(request.provider_endpoint, provider);
    assert_eq!(request.claimed_identifier, Identifier::Uri(canonical));
    assert_eq!(request.local_identifier.as_deref(), Some("https://op.example/u/alice"));
    assert_eq!(request.realm, Realm::parse("https://rp.example/").unwrap());

    let redirect = request.redirect_url(rp.channel());
    assert_eq!(redirect.host_str(), Some("op.example"));
    let query = QueryParameters::from_url(&redirect);
    assert_eq!(query.get("openid.claimed_id"), Some("https://alice.example/"));
    assert_eq!(query.get("openid.identity"), Some("https://op.example/u/alice"));
    assert_eq!(query.get("openid.return_to"), Some("https://rp.example/login?returning=1"));
    assert!(!rp.channel().requires_form_post(&redirect));
}

#[tokio::test]
async fn unknown_identifier_fails_discovery() {
    let rp = relying_party(Arc::new(MockFetcher::new())).await;

    let result = rp.create_request_default(&Identifier::parse("nobody.example").unwrap()).await;
    match result {
        Err(RelyingPartyError::DiscoveryFailed { message, .. }) => {
            assert!(message.contains("HTTP 404"), "unexpected message: {message}");
        },
        other => panic!("expected DiscoveryFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn document_without_endpoint_fails_discovery() {
    let fetcher = Arc::new(MockFetcher::new());
    let page = url("https://plain.example/");
    fetcher.register_document(&page, "text/html", "<html><head></head></html>");

    let rp = relying_party(fetcher).await;
    let result = rp.create_request_default(&Identifier::Uri(page)).await;
    assert_rp_error!(result, DiscoveryFailed);
}

#[tokio::test]
async fn redirect_loop_fails_discovery() {
    let fetcher = Arc::new(MockFetcher::new());
    let a = url("https://a.example/");
    let b = url("https://b.example/");
    fetcher.register_redirect(&a, &b);
    fetcher.register_redirect(&b, &a);

    let rp = relying_party(Arc::clone(&fetcher)).await;
    let result = rp.create_request_default(&Identifier::Uri(a)).await;

    assert_rp_error!(result, DiscoveryFailed);
    assert_eq!(fetcher.fetch_count(), MAX_REDIRECTS + 1);
}

#[tokio::test]
async fn xri_is_not_resolved() {
    let rp = relying_party(Arc::new(MockFetcher::new())).await;
    let result = rp.create_request_default(&Identifier::parse("=alice").unwrap()).await;
    assert_rp_error!(result, DiscoveryFailed);
}
