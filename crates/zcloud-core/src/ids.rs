//! Identifier helpers.
//!
//! Three identity schemes live here:
//!
//! - attachment resources hold a composite `<parent>:<child>` ID;
//! - security-group rules are content-addressed as base64(JSON(tuple)),
//!   because the server assigns no rule IDs;
//! - data sources hash their member IDs to a stable non-negative i32.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdError {
    #[error("malformed composite id {0:?} (expected <parent>:<child>)")]
    MalformedComposite(String),

    #[error("malformed content-addressed id: {0}")]
    MalformedRuleId(String),
}

/// Join an attachment's two halves into `<parent>:<child>`.
pub fn composite_id(parent: &str, child: &str) -> String {
    format!("{parent}:{child}")
}

/// Split a composite ID back into its halves.
pub fn split_composite(id: &str) -> Result<(&str, &str), IdError> {
    match id.split_once(':') {
        Some((parent, child)) if !parent.is_empty() && !child.is_empty() => Ok((parent, child)),
        _ => Err(IdError::MalformedComposite(id.to_string())),
    }
}

/// Content-addressed ID: base64 of the canonical JSON encoding of `tuple`.
/// Field order follows the struct's declaration order, so the encoding is
/// stable across runs.
pub fn rule_id<T: Serialize>(tuple: &T) -> Result<String, IdError> {
    let json = serde_json::to_vec(tuple).map_err(|e| IdError::MalformedRuleId(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Decode a content-addressed ID back into its tuple.
pub fn decode_rule_id<T: DeserializeOwned>(id: &str) -> Result<T, IdError> {
    let json = BASE64
        .decode(id)
        .map_err(|e| IdError::MalformedRuleId(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| IdError::MalformedRuleId(e.to_string()))
}

/// Stable data-source identity: CRC32 (IEEE) of the dash-joined IDs, folded
/// to a non-negative i32. The fold maps `i32::MIN` to 0 and negates other
/// negative values; downstream consumers may depend on the exact values, so
/// the algorithm must not change.
pub fn datasource_id<S: AsRef<str>>(ids: &[S]) -> i32 {
    let joined = ids
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("-");
    let sum = crc32fast::hash(joined.as_bytes()) as i32;
    if sum >= 0 {
        sum
    } else if sum == i32::MIN {
        0
    } else {
        -sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn composite_round_trip() {
        let id = composite_id("eip-abc", "i-123");
        assert_eq!(id, "eip-abc:i-123");
        let (p, c) = split_composite(&id).unwrap();
        assert_eq!((p, c), ("eip-abc", "i-123"));
    }

    #[test]
    fn composite_rejects_malformed() {
        assert!(split_composite("no-separator").is_err());
        assert!(split_composite(":child").is_err());
        assert!(split_composite("parent:").is_err());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tuple {
        #[serde(rename = "securityGroupId")]
        security_group_id: String,
        policy: String,
        #[serde(rename = "cidrIp")]
        cidr_ip: String,
        #[serde(rename = "ipProtocol")]
        ip_protocol: String,
        #[serde(rename = "portRange")]
        port_range: String,
        direction: String,
    }

    #[test]
    fn rule_id_is_base64_of_json() {
        let t = Tuple {
            security_group_id: "sg-1".into(),
            policy: "accept".into(),
            cidr_ip: "0.0.0.0/0".into(),
            ip_protocol: "tcp".into(),
            port_range: "22/22".into(),
            direction: "ingress".into(),
        };
        let id = rule_id(&t).unwrap();
        let json = serde_json::to_vec(&t).unwrap();
        assert_eq!(id, BASE64.encode(json));
        let back: Tuple = decode_rule_id(&id).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn datasource_id_is_deterministic_and_non_negative() {
        let ids = ["i-1", "i-2", "i-3"];
        let a = datasource_id(&ids);
        let b = datasource_id(&ids);
        assert_eq!(a, b);
        assert!(a >= 0);
        assert_ne!(a, datasource_id(&["i-1", "i-2"]));
    }

    #[test]
    fn datasource_id_empty_set() {
        assert!(datasource_id::<&str>(&[]) >= 0);
    }
}
