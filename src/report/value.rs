//! Recursive metadata value with order-preserving objects.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// Structured report value.
///
/// Objects keep their keys in report order, so a parsed report serializes
/// in the order the tool printed it.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    String(String),
    Number(Number),
    Array(Vec<MetaValue>),
    Object(Vec<(String, MetaValue)>),
}

impl MetaValue {
    /// An empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Vec::new())
    }

    /// Looks up `key` when `self` is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        match self {
            Self::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Removes and returns `key` when `self` is an object.
    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        match self {
            Self::Object(entries) => {
                let index = entries.iter().position(|(k, _)| k == key)?;
                Some(entries.remove(index).1)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[MetaValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl Default for MetaValue {
    fn default() -> Self {
        Self::object()
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl Serialize for MetaValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => n.serialize(serializer),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct MetaValueVisitor;

impl<'de> Visitor<'de> for MetaValueVisitor {
    type Value = MetaValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, array or object")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MetaValue, E> {
        Ok(MetaValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MetaValue, E> {
        Ok(MetaValue::String(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MetaValue, E> {
        Ok(MetaValue::Number(v.into()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MetaValue, E> {
        Ok(MetaValue::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MetaValue, E> {
        Ok(Number::from_f64(v).map_or_else(|| MetaValue::String(v.to_string()), MetaValue::Number))
    }

    // The report never produces booleans or nulls; hand-edited caches may.
    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MetaValue, E> {
        Ok(MetaValue::String(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<MetaValue, E> {
        Ok(MetaValue::String(String::new()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<MetaValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(MetaValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MetaValue, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, MetaValue>()? {
            entries.push((key, value));
        }
        Ok(MetaValue::Object(entries))
    }
}

impl<'de> Deserialize<'de> for MetaValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MetaValueVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> MetaValue {
        MetaValue::Object(vec![
            ("Zeta".to_string(), "last".into()),
            ("Alpha".to_string(), MetaValue::Number(1064.into())),
            (
                "Interfaces".to_string(),
                MetaValue::Array(vec![MetaValue::Object(vec![(
                    "Name".to_string(),
                    "en0".into(),
                )])]),
            ),
        ])
    }

    #[test]
    fn test_serialize_keeps_key_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"Zeta":"last","Alpha":1064,"Interfaces":[{"Name":"en0"}]}"#
        );
    }

    #[test]
    fn test_deserialize_keeps_key_order() {
        let json = r#"{"b":1,"a":"x","c":[2.5,"y"]}"#;
        let value: MetaValue = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), json);
    }

    #[test]
    fn test_bool_and_null_become_strings() {
        let value: MetaValue = serde_json::from_str(r#"{"t":true,"n":null}"#).unwrap();
        assert_eq!(value.get("t").unwrap().as_str(), Some("true"));
        assert_eq!(value.get("n").unwrap().as_str(), Some(""));
    }

    #[test]
    fn test_get_and_remove() {
        let mut value = sample();
        assert_eq!(value.get("Alpha").unwrap().as_f64(), Some(1064.0));
        assert!(value.remove("Zeta").is_some());
        assert!(value.get("Zeta").is_none());
        assert!(value.remove("Zeta").is_none());
        assert_eq!(value.get("Interfaces").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_accessors_on_wrong_variant() {
        let value = MetaValue::from("text");
        assert!(value.get("x").is_none());
        assert!(value.as_f64().is_none());
        assert!(value.as_array().is_none());
    }
}
