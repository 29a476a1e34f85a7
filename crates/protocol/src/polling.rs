//! Polling protocol types.
//!
//! A polling client POSTs a [`CertRequest`] naming the domains it wants and
//! receives a [`CertResponse`]. Byte fields travel as standard base64 and the
//! renewal lead time as integer nanoseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request for a certificate covering `domains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRequest {
    pub domains: Vec<String>,
}

/// Server answer to a [`CertRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertResponse {
    /// Remaining validity of the returned certificate.
    #[serde(default, with = "duration_nanos")]
    pub renew_time_left: Duration,

    /// PEM certificate chain.
    #[serde(default, with = "base64_bytes")]
    pub full_chain: Vec<u8>,

    /// PEM private key.
    #[serde(default, with = "base64_bytes")]
    pub key: Vec<u8>,

    /// Error reported by the server; empty on success.
    #[serde(default, rename = "err", skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl CertResponse {
    /// The server-reported error, if any.
    pub fn server_error(&self) -> Option<&str> {
        (!self.error.is_empty()).then_some(self.error.as_str())
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Negative lead times (already expired) collapse to zero.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success_response() {
        let json = r#"{
            "renewTimeLeft": 14400000000000,
            "fullChain": "QzE=",
            "key": "SzE=",
            "err": ""
        }"#;
        let resp: CertResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.renew_time_left, Duration::from_secs(4 * 3600));
        assert_eq!(resp.full_chain, b"C1");
        assert_eq!(resp.key, b"K1");
        assert_eq!(resp.server_error(), None);
    }

    #[test]
    fn test_decode_error_response() {
        let json = r#"{"renewTimeLeft": 0, "fullChain": null, "key": null, "err": "domain not allowed"}"#;
        let resp: CertResponse = serde_json::from_str(json).unwrap();
        assert!(resp.full_chain.is_empty());
        assert!(resp.key.is_empty());
        assert_eq!(resp.server_error(), Some("domain not allowed"));
    }

    #[test]
    fn test_negative_lead_time_is_zero() {
        let resp: CertResponse = serde_json::from_str(r#"{"renewTimeLeft": -5}"#).unwrap();
        assert_eq!(resp.renew_time_left, Duration::ZERO);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result: Result<CertResponse, _> = serde_json::from_str(r#"{"fullChain": "%%%"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_request() {
        let req = CertRequest {
            domains: vec!["example.com".to_string(), "*.example.com".to_string()],
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"domains":["example.com","*.example.com"]}"#
        );
    }

    #[test]
    fn test_encode_response_omits_empty_error() {
        let resp = CertResponse {
            renew_time_left: Duration::from_secs(1),
            full_chain: b"C1".to_vec(),
            key: b"K1".to_vec(),
            error: String::new(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(
            json,
            r#"{"renewTimeLeft":1000000000,"fullChain":"QzE=","key":"SzE="}"#
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_lead_time_never_negative(nanos in proptest::prelude::any::<i64>()) {
            let json = format!(r#"{{"renewTimeLeft": {nanos}}}"#);
            let resp: CertResponse = serde_json::from_str(&json).unwrap();
            proptest::prop_assert_eq!(resp.renew_time_left.as_nanos(), nanos.max(0) as u128);
        }
    }
}
