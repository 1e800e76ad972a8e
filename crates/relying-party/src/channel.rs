//! Wire encoding for OpenID messages.
//!
//! Indirect messages travel through the user agent as query parameters on a
//! redirect. Direct messages between relying party and provider use the
//! newline-delimited key-value form.

use url::Url;

use crate::{error::ProtocolError, query::QueryParameters};

/// Longest indirect message that is safe to send as a redirect.
///
/// Longer messages should be delivered by an auto-submitting form POST,
/// since some user agents truncate long URLs.
pub const DEFAULT_MAX_INDIRECT_MESSAGE_LENGTH: usize = 2048;

/// Encoder and decoder for protocol messages.
///
/// A relying party owns one channel for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    max_indirect_message_length: usize,
}

impl Default for Channel {
    fn default() -> Self {
        Self { max_indirect_message_length: DEFAULT_MAX_INDIRECT_MESSAGE_LENGTH }
    }
}

impl Channel {
    /// Creates a channel with the default redirect length limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel with a custom redirect length limit.
    #[must_use]
    pub fn with_max_indirect_message_length(max_indirect_message_length: usize) -> Self {
        Self { max_indirect_message_length }
    }

    /// Returns the redirect length limit.
    #[must_use]
    pub fn max_indirect_message_length(&self) -> usize {
        self.max_indirect_message_length
    }

    /// Appends `fields` to the query of `endpoint`, keeping any parameters
    /// the endpoint already carries.
    #[must_use]
    pub fn encode_indirect<'a>(
        &self,
        endpoint: &Url,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Url {
        let mut url = endpoint.clone();
        url.set_fragment(None);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in fields {
                pairs.append_pair(key, value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }

    /// Returns `true` if `url` is too long to deliver as a redirect.
    #[must_use]
    pub fn requires_form_post(&self, url: &Url) -> bool {
        url.as_str().len() > self.max_indirect_message_length
    }

    /// Decodes the query string of an indirect message.
    #[must_use]
    pub fn decode_indirect(&self, url: &Url) -> QueryParameters {
        QueryParameters::from_url(url)
    }

    /// Encodes a direct message in key-value form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if a key contains `:` or a newline, or a
    /// value contains a newline.
    pub fn encode_key_value<'a>(
        &self,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<String, ProtocolError> {
        let mut encoded = String::new();
        for (key, value) in fields {
            if key.is_empty() || key.contains([':', '\n']) {
                return Err(ProtocolError::new(format!(
                    "key-value form key {key:?} is empty or contains ':' or a newline"
                )));
            }
            if value.contains('\n') {
                return Err(ProtocolError::new(format!(
                    "key-value form value for {key:?} contains a newline"
                )));
            }
            encoded.push_str(key);
            encoded.push(':');
            encoded.push_str(value);
            encoded.push('\n');
        }
        Ok(encoded)
    }

    /// Decodes a direct message in key-value form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if a non-empty line lacks a `:` separator
    /// or has an empty key.
    pub fn decode_key_value(&self, body: &str) -> Result<QueryParameters, ProtocolError> {
        let mut fields = QueryParameters::new();
        for (index, line) in body.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(ProtocolError::new(format!(
                    "key-value form line {} has no ':' separator",
                    index + 1
                )));
            };
            if key.is_empty() {
                return Err(ProtocolError::new(format!(
                    "key-value form line {} has an empty key",
                    index + 1
                )));
            }
            fields.append(key, value);
        }
        Ok(fields)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_indirect_keeps_existing_query() {
        let channel = Channel::new();
        let endpoint = Url::parse("https://op.example/server?x=1#frag").unwrap();

        let url = channel.encode_indirect(&endpoint, [("openid.mode", "checkid_setup")]);
        assert_eq!(url.as_str(), "https://op.example/server?x=1&openid.mode=checkid_setup");
    }

    #[test]
    fn test_encode_indirect_without_fields() {
        let channel = Channel::new();
        let endpoint = Url::parse("https://op.example/server").unwrap();
        let no_fields: [(&str, &str); 0] = [];
        let url = channel.encode_indirect(&endpoint, no_fields);
        assert_eq!(url.as_str(), "https://op.example/server");
    }

    #[test]
    fn test_encode_then_decode_indirect() {
        let channel = Channel::new();
        let endpoint = Url::parse("https://op.example/server").unwrap();
        let url = channel.encode_indirect(&endpoint, [("openid.return_to", "http://rp/?a=b&c")]);

        let decoded = channel.decode_indirect(&url);
        assert_eq!(decoded.get("openid.return_to"), Some("http://rp/?a=b&c"));
    }

    #[test]
    fn test_requires_form_post() {
        let channel = Channel::with_max_indirect_message_length(30);
        let short = Url::parse("https://op.example/").unwrap();
        let long = Url::parse("https://op.example/a-rather-long-path-segment").unwrap();

        assert!(!channel.requires_form_post(&short));
        assert!(channel.requires_form_post(&long));
        assert_eq!(Channel::new().max_indirect_message_length(), DEFAULT_MAX_INDIRECT_MESSAGE_LENGTH);
    }

    #[test]
    fn test_key_value_encoding() {
        let channel = Channel::new();
        let encoded = channel
            .encode_key_value([("mode", "error"), ("error", "bad: request")])
            .unwrap();
        assert_eq!(encoded, "mode:error\nerror:bad: request\n");

        let decoded = channel.decode_key_value(&encoded).unwrap();
        assert_eq!(decoded.get("error"), Some("bad: request"));
    }

    #[test]
    fn test_key_value_rejects_bad_fields() {
        let channel = Channel::new();
        assert!(channel.encode_key_value([("a:b", "v")]).is_err());
        assert!(channel.encode_key_value([("", "v")]).is_err());
        assert!(channel.encode_key_value([("k", "line\nbreak")]).is_err());
    }

    #[test]
    fn test_key_value_decoding_errors() {
        let channel = Channel::new();
        let err = channel.decode_key_value("mode:id_res\nbroken line\n").unwrap_err();
        assert_eq!(err.message(), "key-value form line 2 has no ':' separator");

        assert!(channel.decode_key_value(":value").is_err());
        assert!(channel.decode_key_value("").unwrap().is_empty());
    }
}
