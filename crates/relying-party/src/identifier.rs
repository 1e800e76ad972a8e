//! User-supplied OpenID identifiers.
//!
//! An identifier is either a URI (`https://alice.example/`) or an XRI
//! (`=alice`). Users routinely omit the scheme, so bare host names are
//! normalized to `http://` URIs.

use std::{fmt, str::FromStr};

use url::Url;

use crate::error::{RelyingPartyError, Result};

/// Global context symbols that start an XRI.
const XRI_GLOBAL_CONTEXT_SYMBOLS: [char; 5] = ['=', '@', '+', '$', '!'];

/// Scheme prefix some users type in front of an XRI.
const XRI_SCHEME: &str = "xri://";

/// A normalized OpenID identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// An HTTP or HTTPS URI with the fragment removed.
    Uri(Url),
    /// An XRI without the `xri://` prefix.
    Xri(String),
}

impl Identifier {
    /// Parses and normalizes a user-supplied identifier.
    ///
    /// Surrounding whitespace is ignored. Input starting with an XRI global
    /// context symbol or `xri://` is an XRI; anything else is a URI, with
    /// `http://` assumed when no scheme is given.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::InvalidIdentifier`] for empty input, a
    /// URI that does not parse, a scheme other than HTTP(S), a URI without a
    /// host, or an XRI containing whitespace.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RelyingPartyError::invalid_identifier(trimmed, "identifier is empty"));
        }

        if let Some(xri) = strip_xri_prefix(trimmed) {
            return Self::parse_xri(trimmed, xri);
        }

        let candidate =
            if has_scheme(trimmed) { trimmed.to_owned() } else { format!("http://{trimmed}") };
        let mut url = Url::parse(&candidate)
            .map_err(|e| RelyingPartyError::invalid_identifier(trimmed, e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelyingPartyError::invalid_identifier(
                trimmed,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(RelyingPartyError::invalid_identifier(trimmed, "identifier has no host"));
        }
        url.set_fragment(None);
        Ok(Self::Uri(url))
    }

    fn parse_xri(original: &str, xri: &str) -> Result<Self> {
        if xri.is_empty() || !xri.starts_with(XRI_GLOBAL_CONTEXT_SYMBOLS) {
            return Err(RelyingPartyError::invalid_identifier(
                original,
                "XRI must start with a global context symbol",
            ));
        }
        if xri.chars().any(char::is_whitespace) {
            return Err(RelyingPartyError::invalid_identifier(original, "XRI contains whitespace"));
        }
        Ok(Self::Xri(xri.to_owned()))
    }

    /// Returns `true` if `input` parses as an identifier.
    #[must_use]
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    /// Returns `true` if discovery on this identifier runs over HTTPS.
    ///
    /// XRIs are resolved through an HTTPS proxy resolver, so they count as
    /// secure.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        match self {
            Self::Uri(url) => url.scheme() == "https",
            Self::Xri(_) => true,
        }
    }

    /// Returns the URI form of the identifier, if it is a URI.
    #[must_use]
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            Self::Uri(url) => Some(url),
            Self::Xri(_) => None,
        }
    }
}

/// Returns `true` if `input` starts with `scheme://`.
///
/// A `://` later in the path or query (`alice.example/?next=http://...`)
/// does not count.
fn has_scheme(input: &str) -> bool {
    input.split_once("://").is_some_and(|(scheme, _)| {
        let mut chars = scheme.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

fn strip_xri_prefix(input: &str) -> Option<&str> {
    if input.starts_with(XRI_GLOBAL_CONTEXT_SYMBOLS) {
        return Some(input);
    }
    let prefix = input.get(..XRI_SCHEME.len())?;
    prefix.eq_ignore_ascii_case(XRI_SCHEME).then(|| &input[XRI_SCHEME.len()..])
}

impl FromStr for Identifier {
    type Err = RelyingPartyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(url) => f.write_str(url.as_str()),
            Self::Xri(xri) => f.write_str(xri),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://alice.example/", "https://alice.example/")]
    #[case("alice.example", "http://alice.example/")]
    #[case("  alice.example/me  ", "http://alice.example/me")]
    #[case("HTTP://Alice.Example/Me#section", "http://alice.example/Me")]
    #[case("http://alice.example:8080/?x=1", "http://alice.example:8080/?x=1")]
    #[case("alice.example/?next=http://rp.example/", "http://alice.example/?next=http://rp.example/")]
    #[case(
        "alice.example/login?next=http://rp.example/",
        "http://alice.example/login?next=http://rp.example/"
    )]
    fn test_uri_normalization(#[case] input: &str, #[case] expected: &str) {
        let identifier = Identifier::parse(input).unwrap();
        assert_eq!(identifier.to_string(), expected);
        assert!(identifier.as_url().is_some());
    }

    #[rstest]
    #[case("=alice", "=alice")]
    #[case("@example*alice", "@example*alice")]
    #[case("xri://=alice", "=alice")]
    #[case("XRI://!!1000", "!!1000")]
    fn test_xri_recognition(#[case] input: &str, #[case] expected: &str) {
        let identifier = Identifier::parse(input).unwrap();
        assert_eq!(identifier, Identifier::Xri(expected.to_owned()));
        assert!(identifier.as_url().is_none());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("ftp://files.example/")]
    #[case("xri://")]
    #[case("xri://alice")]
    #[case("=alice smith")]
    #[case("http://")]
    fn test_invalid_identifiers(#[case] input: &str) {
        let result = Identifier::parse(input);
        assert!(
            matches!(result, Err(RelyingPartyError::InvalidIdentifier { .. })),
            "expected {input:?} to be rejected, got {result:?}"
        );
        assert!(!Identifier::is_valid(input));
    }

    #[rstest]
    #[case("https://alice.example/", true)]
    #[case("svn+ssh://host.example/", true)]
    #[case("alice.example", false)]
    #[case("alice.example/?next=http://rp.example/", false)]
    #[case("alice.example/redirect/https://rp.example/", false)]
    #[case("://alice.example", false)]
    fn test_has_scheme(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(has_scheme(input), expected);
    }

    #[test]
    fn test_is_secure() {
        assert!(Identifier::parse("https://alice.example/").unwrap().is_secure());
        assert!(!Identifier::parse("alice.example").unwrap().is_secure());
        assert!(Identifier::parse("=alice").unwrap().is_secure());
    }

    #[test]
    fn test_from_str() {
        let identifier: Identifier = "alice.example".parse().unwrap();
        assert_eq!(identifier.to_string(), "http://alice.example/");
    }
}
