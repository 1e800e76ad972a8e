//! Return-address computation.
//!
//! The return address is the current request URL, reconciled against the
//! realm so the provider's realm check cannot fail on letter case, and
//! scrubbed of parameters left over from earlier authentication attempts.

use url::Url;

use crate::{protocol::Protocol, realm::Realm};

/// Computes the return address for a request received at `request_url`.
///
/// 1. The fragment is dropped.
/// 2. If the leading segments of the request path equal the realm path
///    except for ASCII letter case, they are rewritten in the realm's
///    casing. Any other mismatch passes through unchanged.
/// 3. Query parameters in the reserved `openid.` namespace and the
///    parameter named `session_token_key` are removed; the rest are kept
///    byte for byte, in order.
#[must_use]
pub fn compute_return_to(realm: &Realm, request_url: &Url, session_token_key: &str) -> Url {
    let mut return_to = request_url.clone();
    return_to.set_fragment(None);

    if let Some(path) = realign_path_case(realm.path(), request_url.path()) {
        tracing::debug!(
            realm_path = realm.path(),
            request_path = request_url.path(),
            "Realigned return address path to realm casing"
        );
        return_to.set_path(&path);
    }

    let surviving = request_url.query().map(|query| {
        query
            .split('&')
            .filter(|piece| {
                decoded_key(piece)
                    .is_some_and(|key| !Protocol::is_reserved_key(&key) && key != session_token_key)
            })
            .collect::<Vec<_>>()
            .join("&")
    });
    return_to.set_query(surviving.as_deref().filter(|query| !query.is_empty()));
    return_to
}

/// Decodes the key of one raw `key[=value]` query piece. Empty pieces have
/// no key.
fn decoded_key(piece: &str) -> Option<String> {
    url::form_urlencoded::parse(piece.as_bytes()).next().map(|(key, _)| key.into_owned())
}

/// Rewrites the prefix of `request_path` covered by `realm_path` in the
/// realm's casing.
///
/// Returns `None` when no rewrite is needed: the prefix already matches
/// exactly, differs by more than case, or does not end at a segment
/// boundary.
#[must_use]
pub fn realign_path_case(realm_path: &str, request_path: &str) -> Option<String> {
    let stem = realm_path.trim_end_matches('/');
    let (head, tail) = request_path.split_at_checked(stem.len())?;
    if head == stem || !head.eq_ignore_ascii_case(stem) {
        return None;
    }
    if !(tail.is_empty() || tail.starts_with('/')) {
        return None;
    }
    Some(format!("{stem}{tail}"))
}
