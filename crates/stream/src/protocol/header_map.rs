//! Immutable header and trailer maps.
//!
//! A [`HeaderMap`] is the payload shared by the headers phase, the trailers phase
//! and stream metadata. It maps a lower-cased name to an ordered list of values
//! and is frozen once built: filters that want to change headers build a new map
//! through [`HeaderMap::to_builder`] and hand it back in their status.
//!
//! Cloning a map is cheap, the entries live behind a shared pointer, which lets the
//! filter chain keep the input of a stopped filter while the filter owns its copy.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use triomphe::Arc;

use crate::protocol::InvalidHeader;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// An immutable mapping from header name to its ordered values.
///
/// Names are lower-cased at construction and no name ever maps to an empty value
/// list. Equality ignores the order of names but not the order of values.
#[derive(Clone)]
pub struct HeaderMap {
    entries: Arc<Vec<HeaderEntry>>,
}

impl HeaderMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self { entries: Arc::new(Vec::new()) }
    }

    pub fn builder() -> HeaderMapBuilder {
        HeaderMapBuilder::new()
    }

    /// Re-enters a builder seeded with this map's entries; `self` is left untouched.
    pub fn to_builder(&self) -> HeaderMapBuilder {
        HeaderMapBuilder { entries: (*self.entries).clone() }
    }

    /// Returns the values for `name`, looked up case-insensitively.
    pub fn value(&self, name: &str) -> Option<&[String]> {
        self.entries.iter().find(|entry| entry.name.eq_ignore_ascii_case(name)).map(|entry| entry.values.as_slice())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Returns the number of distinct names.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}

impl Default for HeaderMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for HeaderMap {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return true;
        }

        self.len() == other.len() && self.iter().all(|(name, values)| other.value(name) == Some(values))
    }
}

impl Eq for HeaderMap {}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(HeaderMapBuilder::new(), |builder, (name, value)| builder.add(name.as_ref(), value)).build()
    }
}

/// Converts an `http` crate header map, keeping every value of a repeated name.
impl TryFrom<&http::HeaderMap> for HeaderMap {
    type Error = InvalidHeader;

    fn try_from(headers: &http::HeaderMap) -> Result<Self, Self::Error> {
        let mut builder = HeaderMapBuilder::new();
        for (name, value) in headers {
            let value = value.to_str().map_err(|_e| InvalidHeader::new(name))?;
            builder = builder.add(name.as_str(), value);
        }
        Ok(builder.build())
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, values) in self.iter() {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(HeaderMapVisitor(PhantomData))
    }
}

struct HeaderMapVisitor(PhantomData<fn() -> HeaderMap>);

impl<'de> Visitor<'de> for HeaderMapVisitor {
    type Value = HeaderMap;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of header names to lists of values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut builder = HeaderMapBuilder::new();
        while let Some((name, values)) = access.next_entry::<String, Vec<String>>()? {
            for value in values {
                builder = builder.add(&name, value);
            }
        }
        Ok(builder.build())
    }
}

/// Mutable staging area for a [`HeaderMap`].
#[derive(Debug, Clone, Default)]
pub struct HeaderMapBuilder {
    entries: Vec<HeaderEntry>,
}

impl HeaderMapBuilder {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Appends `value` to the values of `name`.
    pub fn add<V: Into<String>>(mut self, name: &str, value: V) -> Self {
        let name = normalize(name);
        match self.position(&name) {
            Some(index) => self.entries[index].values.push(value.into()),
            None => self.entries.push(HeaderEntry { name, values: vec![value.into()] }),
        }
        self
    }

    /// Replaces every value of `name`; an empty `values` removes the name.
    pub fn set<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = normalize(name);
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        match (self.position(&name), values.is_empty()) {
            (Some(index), true) => {
                self.entries.remove(index);
            }
            (Some(index), false) => self.entries[index].values = values,
            (None, true) => {}
            (None, false) => self.entries.push(HeaderEntry { name, values }),
        }
        self
    }

    /// Removes `name` and all of its values.
    pub fn remove(mut self, name: &str) -> Self {
        self.entries.retain(|entry| !entry.name.eq_ignore_ascii_case(name));
        self
    }

    /// Removes a single value of `name`, dropping the name with its last value.
    pub fn remove_value(mut self, name: &str, value: &str) -> Self {
        if let Some(index) = self.position(name) {
            let entry = &mut self.entries[index];
            entry.values.retain(|v| v != value);
            if entry.values.is_empty() {
                self.entries.remove(index);
            }
        }
        self
    }

    pub fn build(self) -> HeaderMap {
        HeaderMap { entries: Arc::new(self.entries) }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

#[inline]
fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let headers = HeaderMap::builder().add("Content-Type", "a").add("content-type", "b").build();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.value("content-type"), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(headers.value("CONTENT-TYPE").map(<[String]>::len), Some(2));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["content-type"]);
        assert!(headers.value("accept").is_none());
    }

    #[test]
    fn builder_never_keeps_empty_value_lists() {
        let headers = HeaderMap::builder()
            .add("x-a", "1")
            .add("x-b", "1")
            .add("x-b", "2")
            .remove_value("X-A", "1")
            .set("x-c", Vec::<String>::new())
            .build();

        assert!(!headers.contains("x-a"));
        assert!(!headers.contains("x-c"));
        assert_eq!(headers.value("x-b"), Some(&["1".to_string(), "2".to_string()][..]));

        let headers = headers.to_builder().set("x-b", ["3"]).remove("x-b").build();
        assert!(headers.is_empty());
    }

    #[test]
    fn to_builder_leaves_the_original_frozen() {
        let original = HeaderMap::builder().add(":path", "/").build();
        let modified = original.to_builder().add("x-filter", "seen").build();

        assert!(!original.contains("x-filter"));
        assert!(modified.contains("x-filter"));
        assert_ne!(original, modified);
    }

    #[test]
    fn equality_ignores_name_order() {
        let first = HeaderMap::builder().add("a", "1").add("b", "2").add("b", "3").build();
        let second = HeaderMap::builder().add("B", "2").add("b", "3").add("A", "1").build();
        let reordered_values = HeaderMap::builder().add("a", "1").add("b", "3").add("b", "2").build();

        assert_eq!(first, second);
        assert_ne!(first, reordered_values);
    }

    #[test]
    fn from_http_header_map() {
        let mut raw = http::HeaderMap::new();
        raw.append(http::header::ACCEPT, http::HeaderValue::from_static("text/html"));
        raw.append(http::header::ACCEPT, http::HeaderValue::from_static("*/*"));
        raw.insert(http::header::HOST, http::HeaderValue::from_static("example.com"));

        let headers = HeaderMap::try_from(&raw).unwrap();

        assert_eq!(headers.value("accept"), Some(&["text/html".to_string(), "*/*".to_string()][..]));
        assert_eq!(headers.value("Host"), Some(&["example.com".to_string()][..]));
    }

    #[test]
    fn from_http_header_map_rejects_opaque_values() {
        let mut raw = http::HeaderMap::new();
        raw.insert("x-binary", http::HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap());

        let error = HeaderMap::try_from(&raw).unwrap_err();
        assert_eq!(error.name(), "x-binary");
    }

    #[test]
    fn deserialize_normalizes_names() {
        let headers: HeaderMap = serde_json::from_str(r#"{"Content-Type": ["a", "b"], "X-Empty": []}"#).unwrap();

        assert_eq!(headers.value("content-type"), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(!headers.contains("x-empty"));
        assert_eq!(serde_json::to_string(&headers).unwrap(), r#"{"content-type":["a","b"]}"#);
    }
}
