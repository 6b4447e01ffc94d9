//! Request parameters and their canonical form encoding.
//!
//! # Design
//! The signature is computed over the exact encoded string that goes on the
//! wire, so parameters keep insertion order and are encoded once, here.
//! Encoding leaves `A-Z a-z 0-9 - _ . ! ~ * ' ( )` untouched and escapes
//! everything else as `%XX`. Inside `msg` the service additionally requires
//! `! ' ( ) *` to be escaped.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MESSAGE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Key whose value gets the stricter escaping.
pub const MESSAGE_KEY: &str = "msg";

/// A single parameter value: a string or a number in its decimal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue(String);

impl ParamValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue(value.clone())
    }
}

macro_rules! numeric_param {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ParamValue {
                fn from(value: $t) -> Self {
                    ParamValue(value.to_string())
                }
            }
        )*
    };
}

numeric_param!(i32, i64, u32, u64, usize, f64);

/// Ordered string-keyed parameters for one call. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    entries: Vec<(String, ParamValue)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a parameter. An existing key keeps its position and takes the
    /// new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Canonical `application/x-www-form-urlencoded` string.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            if !out.is_empty() {
                out.push('&');
            }
            let set = if key == MESSAGE_KEY {
                MESSAGE_VALUE
            } else {
                FORM_VALUE
            };
            out.extend(utf8_percent_encode(key, FORM_VALUE));
            out.push('=');
            out.extend(utf8_percent_encode(value.as_str(), set));
        }
        out
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RequestParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_encode_to_empty_string() {
        assert_eq!(RequestParams::new().encode(), "");
    }

    #[test]
    fn encoding_keeps_insertion_order() {
        let params = RequestParams::new()
            .with("address", "1abc")
            .with("amount", "0.1");
        assert_eq!(params.encode(), "address=1abc&amount=0.1");
    }

    #[test]
    fn numbers_use_decimal_form() {
        let params = RequestParams::new().with("amount", 0.1).with("ad_id", 12345u64);
        assert_eq!(params.encode(), "amount=0.1&ad_id=12345");
    }

    #[test]
    fn reinserting_a_key_replaces_in_place() {
        let mut params = RequestParams::new().with("a", "1").with("b", "2");
        params.insert("a", "3");
        assert_eq!(params.encode(), "a=3&b=2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let params = RequestParams::new().with("q", "a b&c=d/é");
        assert_eq!(params.encode(), "q=a%20b%26c%3Dd%2F%C3%A9");
    }

    #[test]
    fn sub_delimiters_pass_through_outside_msg() {
        let params = RequestParams::new().with("note", "hi!(x)*'");
        assert_eq!(params.encode(), "note=hi!(x)*'");
    }

    #[test]
    fn msg_escapes_sub_delimiters() {
        let params = RequestParams::new().with("msg", "a!b");
        assert_eq!(params.encode(), "msg=a%21b");

        let params = RequestParams::new().with("msg", "it's (really) *great*");
        assert_eq!(
            params.encode(),
            "msg=it%27s%20%28really%29%20%2Agreat%2A"
        );
    }

    #[test]
    fn remove_returns_value() {
        let mut params = RequestParams::new().with("path", "us").with("page", 2);
        assert_eq!(params.remove("path").unwrap().as_str(), "us");
        assert!(params.remove("path").is_none());
        assert_eq!(params.encode(), "page=2");
    }

    #[test]
    fn collects_from_pairs() {
        let params: RequestParams = [("x", "1"), ("y", "2")].into_iter().collect();
        assert_eq!(params.get("y").map(ParamValue::as_str), Some("2"));
    }
}
