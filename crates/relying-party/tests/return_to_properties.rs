//! Property tests for return-address reconciliation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use openid_rp::{QueryParameters, Realm, compute_return_to};
use proptest::prelude::*;
use url::Url;

const SESSION_KEY: &str = "sid";

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9]{0,7}"
}

fn param_key() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z]{1,6}",
        2 => "[a-z]{1,6}".prop_map(|k| format!("openid.{k}")),
        1 => Just(SESSION_KEY.to_owned()),
    ]
}

fn params() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((param_key(), "[a-zA-Z0-9 &=.]{0,8}"), 0..8)
}

/// Flips the ASCII case of every letter at an odd index.
fn scramble_case(text: &str) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| {
            if i % 2 == 1 {
                if c.is_ascii_uppercase() { c.to_ascii_lowercase() } else { c.to_ascii_uppercase() }
            } else {
                c
            }
        })
        .collect()
}

fn request_url(path: &str, params: &[(String, String)]) -> Url {
    let mut url = Url::parse("https://rp.example/").unwrap();
    url.set_path(path);
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    url
}

proptest! {
    #[test]
    fn stripped_keys_never_survive(params in params()) {
        let realm = Realm::parse("https://rp.example/").unwrap();
        let url = request_url("/login", &params);

        let return_to = compute_return_to(&realm, &url, SESSION_KEY);
        let surviving: Vec<(String, String)> = QueryParameters::from_url(&return_to)
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let expected: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| !k.starts_with("openid.") && k != SESSION_KEY)
            .cloned()
            .collect();

        prop_assert_eq!(surviving, expected);
    }

    #[test]
    fn path_case_matches_realm(
        app in segment(),
        page in segment(),
        params in params(),
    ) {
        let realm_path = format!("/{app}/");
        let realm = Realm::parse(&format!("https://rp.example{realm_path}")).unwrap();
        let request_path = format!("/{}/{page}", scramble_case(&app));
        let url = request_url(&request_path, &params);

        let return_to = compute_return_to(&realm, &url, SESSION_KEY);

        prop_assert!(return_to.path().starts_with(&realm_path));
        prop_assert_eq!(return_to.path(), format!("{realm_path}{page}"));
        prop_assert!(realm.contains(&return_to));
    }

    #[test]
    fn scheme_and_host_are_untouched(app in segment(), params in params()) {
        let realm = Realm::parse(&format!("https://rp.example/{app}/")).unwrap();
        let url = request_url(&format!("/{app}/x"), &params);

        let return_to = compute_return_to(&realm, &url, SESSION_KEY);
        prop_assert_eq!(return_to.scheme(), "https");
        prop_assert_eq!(return_to.host_str(), Some("rp.example"));
        prop_assert_eq!(return_to.fragment(), None);
    }
}
