//! Realms: the URL patterns a user is asked to trust.
//!
//! A realm names the part of a site an authentication applies to. The
//! provider shows it to the user and checks that the return address lies
//! under it. A realm host may start with `*.` to cover every subdomain.

use std::{fmt, str::FromStr};

use url::Url;

use crate::error::{RelyingPartyError, Result};

const WILDCARD_PREFIX: &str = "*.";

/// A parsed realm.
///
/// The stored URL never contains the wildcard marker; [`is_wildcard`]
/// records whether one was present.
///
/// [`is_wildcard`]: Realm::is_wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Realm {
    url: Url,
    wildcard: bool,
}

impl Realm {
    /// Parses a realm such as `https://*.example.com/app/`.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::InvalidRealm`] if the realm does not
    /// parse, uses a scheme other than HTTP(S), has no host, or carries a
    /// fragment.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (text, wildcard) = match trimmed.split_once("://") {
            Some((scheme, rest)) if rest.starts_with(WILDCARD_PREFIX) => {
                (format!("{scheme}://{}", &rest[WILDCARD_PREFIX.len()..]), true)
            },
            _ => (trimmed.to_owned(), false),
        };

        let url =
            Url::parse(&text).map_err(|e| RelyingPartyError::invalid_realm(trimmed, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelyingPartyError::invalid_realm(
                trimmed,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(RelyingPartyError::invalid_realm(trimmed, "realm has no host"));
        }
        if url.fragment().is_some() {
            return Err(RelyingPartyError::invalid_realm(trimmed, "realm must not have a fragment"));
        }

        Ok(Self { url, wildcard })
    }

    /// Derives the realm for an application from the current request.
    ///
    /// The realm is the request's scheme and authority joined with the
    /// application's base path, which always ends in `/`. The request's
    /// query and fragment are dropped.
    #[must_use]
    pub fn auto_detect(request_url: &Url, application_path: &str) -> Self {
        let mut path = String::with_capacity(application_path.len() + 2);
        if !application_path.starts_with('/') {
            path.push('/');
        }
        path.push_str(application_path);
        if !path.ends_with('/') {
            path.push('/');
        }

        let mut url = request_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&path);
        Self { url, wildcard: false }
    }

    /// Returns `true` if the realm covers `url`.
    ///
    /// The scheme and port must match exactly. The host must match, or be
    /// a subdomain of the realm host when the realm is a wildcard. The path
    /// of `url` must start with the realm path; a realm path without a
    /// trailing slash only matches at a segment boundary.
    #[must_use]
    pub fn contains(&self, url: &Url) -> bool {
        if url.scheme() != self.url.scheme()
            || url.port_or_known_default() != self.url.port_or_known_default()
        {
            return false;
        }

        let (Some(realm_host), Some(host)) = (self.url.host_str(), url.host_str()) else {
            return false;
        };
        let host_matches = host == realm_host
            || (self.wildcard
                && host.strip_suffix(realm_host).is_some_and(|sub| sub.ends_with('.')));
        if !host_matches {
            return false;
        }

        let realm_path = self.url.path();
        let Some(rest) = url.path().strip_prefix(realm_path) else {
            return false;
        };
        realm_path.ends_with('/') || rest.is_empty() || rest.starts_with('/')
    }

    /// Returns `true` if the realm uses HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Returns `true` if the realm host started with `*.`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Returns the realm URL with any wildcard marker removed.
    #[must_use]
    pub fn no_wildcard_url(&self) -> &Url {
        &self.url
    }

    /// Returns the realm path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

impl FromStr for Realm {
    type Err = RelyingPartyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            f.write_str(&self.url.as_str().replacen("://", "://*.", 1))
        } else {
            f.write_str(self.url.as_str())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_plain_realm() {
        let realm = Realm::parse("https://rp.example/app/").unwrap();
        assert!(!realm.is_wildcard());
        assert!(realm.is_secure());
        assert_eq!(realm.path(), "/app/");
        assert_eq!(realm.to_string(), "https://rp.example/app/");
    }

    #[test]
    fn test_parse_wildcard_realm() {
        let realm = Realm::parse("http://*.example.com/").unwrap();
        assert!(realm.is_wildcard());
        assert!(!realm.is_secure());
        assert_eq!(realm.no_wildcard_url().as_str(), "http://example.com/");
        assert_eq!(realm.to_string(), "http://*.example.com/");
    }

    #[rstest]
    #[case("https://rp.example/#top")]
    #[case("ftp://rp.example/")]
    #[case("not a realm")]
    #[case("http://")]
    fn test_parse_rejects(#[case] input: &str) {
        let result = Realm::parse(input);
        assert!(
            matches!(result, Err(RelyingPartyError::InvalidRealm { .. })),
            "expected {input:?} to be rejected, got {result:?}"
        );
    }

    #[rstest]
    #[case("http://rp.example/", "http://rp.example/login?x=1", true)]
    #[case("http://rp.example/app/", "http://rp.example/app/page", true)]
    #[case("http://rp.example/app/", "http://rp.example/application", false)]
    #[case("http://rp.example/app", "http://rp.example/app/page", true)]
    #[case("http://rp.example/app", "http://rp.example/app", true)]
    #[case("http://rp.example/app", "http://rp.example/apple", false)]
    #[case("http://rp.example/app/", "http://rp.example/App/page", false)]
    #[case("http://rp.example/", "https://rp.example/", false)]
    #[case("http://rp.example/", "http://rp.example:8080/", false)]
    #[case("http://rp.example:80/", "http://rp.example/", true)]
    #[case("http://rp.example/", "http://www.rp.example/", false)]
    #[case("http://*.rp.example/", "http://www.rp.example/", true)]
    #[case("http://*.rp.example/", "http://rp.example/", true)]
    #[case("http://*.rp.example/", "http://evilrp.example/", false)]
    fn test_contains(#[case] realm: &str, #[case] candidate: &str, #[case] expected: bool) {
        let realm = Realm::parse(realm).unwrap();
        assert_eq!(realm.contains(&url(candidate)), expected);
    }

    #[rstest]
    #[case("http://rp.example/App/login.aspx?q=1#f", "/App", "http://rp.example/App/")]
    #[case("http://rp.example/login", "/", "http://rp.example/")]
    #[case("https://rp.example:8443/a/b", "a", "https://rp.example:8443/a/")]
    #[case("http://rp.example/x", "", "http://rp.example/")]
    fn test_auto_detect(#[case] request: &str, #[case] app_path: &str, #[case] expected: &str) {
        let realm = Realm::auto_detect(&url(request), app_path);
        assert_eq!(realm.to_string(), expected);
        assert!(realm.contains(&url(expected)));
    }
}
