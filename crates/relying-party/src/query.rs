//! Ordered name/value collections for inbound request parameters.

use url::{Url, form_urlencoded};

/// An ordered, case-sensitive multimap of request parameters.
///
/// Order is preserved so that re-encoding a query (for example when
/// computing a return address) keeps the original parameter order.
/// Lookups return the first value recorded under a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters {
    pairs: Vec<(String, String)>,
}

impl QueryParameters {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the query string of `url`.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        url.query_pairs().collect()
    }

    /// Decodes an `application/x-www-form-urlencoded` request body.
    #[must_use]
    pub fn from_form_body(body: &[u8]) -> Self {
        form_urlencoded::parse(body).collect()
    }

    /// Appends a parameter, keeping any existing values for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Returns the first value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Returns `true` if at least one value exists for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Iterates over the parameters in their original order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a copy that keeps only parameters whose key satisfies `keep`.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        self.pairs.iter().filter(|(k, _)| keep(k)).cloned().collect()
    }

    /// Number of parameters, counting repeated keys separately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
