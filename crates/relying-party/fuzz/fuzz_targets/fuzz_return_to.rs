//! Structured fuzz target for return-address reconciliation.
//!
//! Builds a realm and a request URL from fuzzed path segments and query
//! parameters, then checks that reserved and session parameters never
//! survive and that reconciliation never panics.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use openid_rp::{QueryParameters, Realm, compute_return_to};
use url::Url;

/// Structured input for a fuzzed return-address computation.
#[derive(Debug, Arbitrary)]
struct FuzzedRequest {
    /// Path of the realm, joined under the host.
    realm_path: String,
    /// Path of the inbound request.
    request_path: String,
    /// Query parameters of the inbound request.
    params: Vec<(String, String)>,
    /// Session token key to strip.
    session_key: String,
}

fuzz_target!(|input: FuzzedRequest| {
    let Ok(realm) = Realm::parse(&format!("https://rp.example/{}", input.realm_path)) else {
        return;
    };
    let Ok(mut url) = Url::parse("https://rp.example/") else {
        return;
    };
    url.set_path(&input.request_path);
    if !input.params.is_empty() {
        url.query_pairs_mut().extend_pairs(&input.params);
    }

    let return_to = compute_return_to(&realm, &url, &input.session_key);

    for (key, _) in QueryParameters::from_url(&return_to).iter() {
        assert!(!key.starts_with("openid."), "reserved key survived: {key}");
        assert_ne!(key, input.session_key, "session key survived");
    }
    assert_eq!(return_to.host_str(), Some("rp.example"));
});
