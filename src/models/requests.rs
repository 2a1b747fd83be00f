//! Request DTOs for the cache HTTP surface
//!
//! Defines the structure of incoming request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{GetOptions, SetOptions, Strategy, MAX_KEY_LENGTH};
use crate::error::Result;

/// Request body for the SET operation (PUT /set)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: Value,
    /// Optional TTL in milliseconds
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Optional validator stored alongside the value
    #[serde(default)]
    pub etag: Option<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl_ms == Some(0) {
            return Some("TTL must be positive".to_string());
        }
        None
    }

    pub fn options(&self) -> SetOptions {
        SetOptions {
            ttl_ms: self.ttl_ms,
            etag: self.etag.clone(),
            ..SetOptions::default()
        }
    }
}

/// Query string for GET /get/:key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetQuery {
    /// Strategy name, e.g. `network-first`
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub force: bool,
}

impl GetQuery {
    /// Converts the query into cache options, rejecting unknown strategies.
    pub fn options(&self) -> Result<GetOptions> {
        let strategy = self
            .strategy
            .as_deref()
            .map(str::parse::<Strategy>)
            .transpose()?;

        Ok(GetOptions {
            ttl_ms: self.ttl_ms,
            strategy,
            force: self.force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": {"name": "hello"}}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value["name"], "hello");
        assert!(req.ttl_ms.is_none());
        assert!(req.etag.is_none());
    }

    #[test]
    fn test_set_request_with_ttl() {
        let json = r#"{"key": "test", "value": 1, "ttl_ms": 60000, "etag": "v1"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        let options = req.options();
        assert_eq!(options.ttl_ms, Some(60_000));
        assert_eq!(options.etag.as_deref(), Some("v1"));
    }

    #[test]
    fn test_validate_empty_key() {
        let req = SetRequest {
            key: "".to_string(),
            value: Value::Null,
            ttl_ms: None,
            etag: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let req = SetRequest {
            key: "k".to_string(),
            value: Value::Null,
            ttl_ms: Some(0),
            etag: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        let req = SetRequest {
            key: "valid_key".to_string(),
            value: Value::from("test"),
            ttl_ms: Some(60),
            etag: None,
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_get_query_options() {
        let query = GetQuery {
            strategy: Some("network-first".into()),
            ttl_ms: Some(10),
            force: true,
        };
        let options = query.options().unwrap();
        assert_eq!(options.strategy, Some(Strategy::NetworkFirst));
        assert_eq!(options.ttl_ms, Some(10));
        assert!(options.force);
    }

    #[test]
    fn test_get_query_unknown_strategy() {
        let query = GetQuery {
            strategy: Some("sometimes".into()),
            ..GetQuery::default()
        };
        assert!(query.options().is_err());
    }
}
