//! Typed field values held by documents

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single document field value.
///
/// Mirrors the value kinds of the managed document store so that ordering
/// and cursor comparisons behave the same in memory and remotely.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Bytes(Vec<u8>),
    /// Reference to another document, by full resource name
    Reference(String),
    GeoPoint { latitude: f64, longitude: f64 },
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Cross-type ordering rank used by the store
    fn type_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Boolean(_) => 1,
            FieldValue::Integer(_) | FieldValue::Double(_) => 2,
            FieldValue::Timestamp(_) => 3,
            FieldValue::String(_) => 4,
            FieldValue::Bytes(_) => 5,
            FieldValue::Reference(_) => 6,
            FieldValue::GeoPoint { .. } => 7,
            FieldValue::Array(_) => 8,
            FieldValue::Map(_) => 9,
        }
    }

    /// Total order over values. Integers and doubles compare numerically,
    /// NaN sorts before every other number.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (a, b) if a.type_rank() == 2 => compare_numbers(a.as_f64(), b.as_f64()),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a.cmp(b),
            (FieldValue::Reference(a), FieldValue::Reference(b)) => a.cmp(b),
            (
                FieldValue::GeoPoint {
                    latitude: la,
                    longitude: lo,
                },
                FieldValue::GeoPoint {
                    latitude: lb,
                    longitude: lob,
                },
            ) => compare_numbers(Some(*la), Some(*lb))
                .then_with(|| compare_numbers(Some(*lo), Some(*lob))),
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (FieldValue::Map(a), FieldValue::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        }
    }

    /// Numeric view of integer and double values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Convert plain JSON into a field value. Strings stay strings, no
    /// timestamp sniffing is done.
    pub fn from_json(json: &Json) -> FieldValue {
        match json {
            Json::Null => FieldValue::Null,
            Json::Bool(b) => FieldValue::Boolean(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => FieldValue::String(s.clone()),
            Json::Array(items) => FieldValue::Array(items.iter().map(FieldValue::from_json).collect()),
            Json::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as plain JSON for API responses and typed decoding
    pub fn to_json(&self) -> Json {
        match self {
            FieldValue::Null => Json::Null,
            FieldValue::Boolean(b) => Json::Bool(*b),
            FieldValue::Integer(i) => Json::Number((*i).into()),
            FieldValue::Double(d) => Number::from_f64(*d).map(Json::Number).unwrap_or(Json::Null),
            FieldValue::Timestamp(ts) => {
                Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::String(s) => Json::String(s.clone()),
            FieldValue::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
            FieldValue::Reference(name) => Json::String(name.clone()),
            FieldValue::GeoPoint {
                latitude,
                longitude,
            } => {
                let mut map = Map::new();
                map.insert("latitude".to_string(), FieldValue::Double(*latitude).to_json());
                map.insert("longitude".to_string(), FieldValue::Double(*longitude).to_json());
                Json::Object(map)
            }
            FieldValue::Array(values) => Json::Array(values.iter().map(FieldValue::to_json).collect()),
            FieldValue::Map(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn compare_numbers(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        },
        _ => Ordering::Equal,
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        FieldValue::Double(d)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts)
    }
}
