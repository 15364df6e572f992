//! Known-or-unknown values for plan-time computation.
//!
//! A [`Knowable`] is either a concrete value or a marker that the value will
//! only be known after apply. Every combinator propagates `Unknown`, so a
//! field derived from any unknown input is itself unknown.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker key used on the wire for unknown values: `{"$unknown": true}`.
pub const UNKNOWN_MARKER: &str = "$unknown";

/// A value that may not be known until apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Knowable<T> {
    Known(T),
    Unknown,
}

impl<T> Knowable<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Knowable::Known(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Knowable::Unknown)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Knowable::Known(v) => Some(v),
            Knowable::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<T> {
        match self {
            Knowable::Known(v) => Some(v),
            Knowable::Unknown => None,
        }
    }

    pub fn as_ref(&self) -> Knowable<&T> {
        match self {
            Knowable::Known(v) => Knowable::Known(v),
            Knowable::Unknown => Knowable::Unknown,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Knowable<U> {
        match self {
            Knowable::Known(v) => Knowable::Known(f(v)),
            Knowable::Unknown => Knowable::Unknown,
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Knowable<U>>(self, f: F) -> Knowable<U> {
        match self {
            Knowable::Known(v) => f(v),
            Knowable::Unknown => Knowable::Unknown,
        }
    }

    /// Known only when both sides are known.
    pub fn zip<U>(self, other: Knowable<U>) -> Knowable<(T, U)> {
        match (self, other) {
            (Knowable::Known(a), Knowable::Known(b)) => Knowable::Known((a, b)),
            _ => Knowable::Unknown,
        }
    }
}

impl<T, E> Knowable<Result<T, E>> {
    /// `Known(Err(e))` becomes `Err(e)`; everything else is `Ok`.
    pub fn transpose(self) -> Result<Knowable<T>, E> {
        match self {
            Knowable::Known(Ok(v)) => Ok(Knowable::Known(v)),
            Knowable::Known(Err(e)) => Err(e),
            Knowable::Unknown => Ok(Knowable::Unknown),
        }
    }
}

impl<T> From<T> for Knowable<T> {
    fn from(value: T) -> Self {
        Knowable::Known(value)
    }
}

impl<T: Serialize> Serialize for Knowable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Knowable::Known(v) => v.serialize(serializer),
            Knowable::Unknown => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(UNKNOWN_MARKER, &true)?;
                map.end()
            }
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Knowable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if is_unknown_marker(&value) {
            return Ok(Knowable::Unknown);
        }
        serde_json::from_value(value)
            .map(Knowable::Known)
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) fn is_unknown_marker(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => {
            map.len() == 1 && map.get(UNKNOWN_MARKER) == Some(&serde_json::Value::Bool(true))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_propagates_through_map_and_zip() {
        let known: Knowable<u32> = Knowable::Known(1);
        let unknown: Knowable<u32> = Knowable::Unknown;

        assert_eq!(known.map(|n| n + 1), Knowable::Known(2));
        assert_eq!(unknown.map(|n| n + 1), Knowable::Unknown);
        assert_eq!(known.zip(unknown), Knowable::Unknown);
        assert_eq!(known.zip(Knowable::Known("a")), Knowable::Known((1, "a")));
    }

    #[test]
    fn test_transpose_surfaces_known_errors_only() {
        let err: Knowable<Result<u32, &str>> = Knowable::Known(Err("boom"));
        assert_eq!(err.transpose(), Err("boom"));

        let unknown: Knowable<Result<u32, &str>> = Knowable::Unknown;
        assert_eq!(unknown.transpose(), Ok(Knowable::Unknown));
    }

    #[test]
    fn test_serde_uses_unknown_marker() {
        let json = serde_json::to_string(&Knowable::<u32>::Unknown).expect("serialize");
        assert_eq!(json, r#"{"$unknown":true}"#);

        let back: Knowable<u32> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Knowable::Unknown);

        let known: Knowable<u32> = serde_json::from_str("7").expect("deserialize");
        assert_eq!(known, Knowable::Known(7));
    }
}
