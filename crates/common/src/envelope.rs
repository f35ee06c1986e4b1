use serde::{Deserialize, Serialize};

use crate::crypto::KeyFormat;

/// Request header carrying the caller's base64-armored public key PEM
pub const CLIENT_KEY_HEADER: &str = "x-client-key";

/// Reserved envelope field name carrying the base64 ciphertext
pub const SEALED_FIELD: &str = "__sealed";

/// Fixed plain-text body sent with a 400 refusal
pub const REFUSAL_BODY: &str = "request refused by rsa service";

/// Fixed plain-text body sent with a 500 when sealing a response fails
///
/// The handler's original payload is discarded rather than leaked.
pub const RESPONSE_SEAL_FAILED_BODY: &str = "error encrypting response data";

/// The wire wrapper for any encrypted payload
///
/// A JSON object with the single reserved field `__sealed`, so a
/// receiver can tell an RSA-wrapped body apart from an ordinary
/// plain-string error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "__sealed")]
    pub sealed: String,
}

impl Envelope {
    pub fn new(sealed: impl Into<String>) -> Self {
        Self {
            sealed: sealed.into(),
        }
    }
}

/// Body served by the key-publication endpoint
///
/// Both fields are required: a response missing either is not a
/// well-formed announcement and discovery keeps retrying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyAnnouncement {
    pub key: String,
    pub format: KeyFormat,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let json = serde_json::to_string(&Envelope::new("YWJj")).unwrap();
        assert_eq!(json, r#"{"__sealed":"YWJj"}"#);

        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sealed, "YWJj");
    }

    #[test]
    fn test_object_without_reserved_field_is_not_an_envelope() {
        assert!(serde_json::from_str::<Envelope>(r#"{"body":"hi"}"#).is_err());
    }

    #[test]
    fn test_announcement_requires_both_fields() {
        let ok: KeyAnnouncement =
            serde_json::from_str(r#"{"key":"pem text","format":"pkcs1-pem"}"#).unwrap();
        assert_eq!(ok.key, "pem text");
        assert_eq!(ok.format, KeyFormat::Pkcs1Pem);

        assert!(serde_json::from_str::<KeyAnnouncement>(r#"{"key":"pem text"}"#).is_err());
        assert!(serde_json::from_str::<KeyAnnouncement>(r#"{"format":"pkcs1-pem"}"#).is_err());
    }
}
