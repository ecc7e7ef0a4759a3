//! Claim set carried by relay tokens
//!
//! The registered claims the relay inspects are typed fields. Everything else
//! lands in [`Claims::extra`], an insertion-ordered JSON map, so a refresh can
//! copy custom claims through without knowing their shape. Numbers keep their
//! exact source text, so a reissued token carries them unchanged.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded JWT claims
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    /// Subject; the deployment location the token was issued for
    pub sub: Option<String>,
    /// Issuer
    pub iss: Option<String>,
    /// Issued-at, seconds since the epoch
    pub iat: Option<i64>,
    /// Expiry, seconds since the epoch
    pub exp: Option<i64>,
    /// Passthrough claims, in the order they appeared in the token
    ///
    /// A `sub` or `iss` that is not a string stays here untouched.
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Create an empty claim set with a subject
    pub fn for_subject(sub: impl Into<String>) -> Self {
        Self {
            sub: Some(sub.into()),
            ..Self::default()
        }
    }

    /// Set the issuer
    #[must_use]
    pub fn with_issuer(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Set the validity window
    #[must_use]
    pub fn with_lifetime(mut self, iat: i64, exp: i64) -> Self {
        self.iat = Some(iat);
        self.exp = Some(exp);
        self
    }

    /// Append a custom claim
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Subject, or the empty string when absent
    #[must_use]
    pub fn subject(&self) -> &str {
        self.sub.as_deref().unwrap_or_default()
    }
}

impl Serialize for Claims {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let registered = [
            self.sub.is_some(),
            self.iss.is_some(),
            self.iat.is_some(),
            self.exp.is_some(),
        ];
        let len = registered.iter().filter(|present| **present).count() + self.extra.len();

        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(sub) = &self.sub {
            map.serialize_entry("sub", sub)?;
        }
        if let Some(iss) = &self.iss {
            map.serialize_entry("iss", iss)?;
        }
        if let Some(iat) = self.iat {
            map.serialize_entry("iat", &iat)?;
        }
        if let Some(exp) = self.exp {
            map.serialize_entry("exp", &exp)?;
        }
        for (name, value) in &self.extra {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Claims {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut extra = Map::<String, Value>::deserialize(deserializer)?;

        let sub = take_string(&mut extra, "sub");
        let iss = take_string(&mut extra, "iss");
        let iat = take_timestamp(&mut extra, "iat").map_err(de::Error::custom)?;
        let exp = take_timestamp(&mut extra, "exp").map_err(de::Error::custom)?;

        Ok(Self {
            sub,
            iss,
            iat,
            exp,
            extra,
        })
    }
}

/// Remove `name` if it holds a string; other values are left in place
fn take_string(claims: &mut Map<String, Value>, name: &str) -> Option<String> {
    match claims.get(name) {
        Some(Value::String(_)) => match claims.shift_remove(name) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Accept integer, float and numeric-string timestamps; floats are truncated.
fn take_timestamp(claims: &mut Map<String, Value>, name: &str) -> Result<Option<i64>, String> {
    let Some(value) = claims.shift_remove(name) else {
        return Ok(None);
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            #[allow(clippy::cast_possible_truncation)]
            let secs = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64));
            secs.map(Some)
                .ok_or_else(|| format!("{name} out of range: {n}"))
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| format!("invalid {name} {s:?}: {e}")),
        other => Err(format!("expected numeric {name}, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_custom_claims_keep_order_and_type() {
        let raw = json!({
            "sub": "eu-west",
            "zeta": 1,
            "iat": 100,
            "alpha": {"nested": [true, null]},
            "exp": 200,
            "mid": "x"
        });

        let claims: Claims = serde_json::from_value(raw).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("eu-west"));
        assert_eq!(claims.iat, Some(100));
        assert_eq!(claims.exp, Some(200));

        let keys: Vec<&str> = claims.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        assert_eq!(claims.extra["alpha"], json!({"nested": [true, null]}));
    }

    #[test]
    fn test_float_and_string_timestamps() {
        let claims: Claims =
            serde_json::from_value(json!({"iat": 1_700_000_000.9, "exp": "1700000600"})).unwrap();
        assert_eq!(claims.iat, Some(1_700_000_000));
        assert_eq!(claims.exp, Some(1_700_000_600));
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        let result: Result<Claims, _> = serde_json::from_value(json!({"exp": true}));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_string_registered_claims_stay_custom() {
        let claims: Claims =
            serde_json::from_value(json!({"sub": 42, "iss": ["a"], "exp": 200})).unwrap();
        assert_eq!(claims.sub, None);
        assert_eq!(claims.iss, None);
        assert_eq!(claims.extra["sub"], json!(42));
        assert_eq!(claims.extra["iss"], json!(["a"]));

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value, json!({"exp": 200, "sub": 42, "iss": ["a"]}));
    }

    #[test]
    fn test_numbers_keep_source_text() {
        let raw = r#"{"sub":"x","acct":123456789012345678901234567890,"ratio":1e3,"exp":5}"#;
        let claims: Claims = serde_json::from_str(raw).unwrap();
        assert_eq!(claims.exp, Some(5));
        assert_eq!(
            serde_json::to_string(&claims).unwrap(),
            r#"{"sub":"x","exp":5,"acct":123456789012345678901234567890,"ratio":1e3}"#
        );
    }

    #[test]
    fn test_absent_fields_not_serialized() {
        let value = serde_json::to_value(Claims::for_subject("lab")).unwrap();
        assert_eq!(value, json!({"sub": "lab"}));
    }
}
