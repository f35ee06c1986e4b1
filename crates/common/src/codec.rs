use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Errors raised while transcoding between text encodings
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64 text: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid hex text: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("decoded bytes are not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Text encodings a key or header value may travel in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    Utf8,
    Base64,
    Hex,
}

/// Convert text from one encoding to another
///
/// The round trip goes through raw bytes, so any pair of encodings
/// composes. `transcode(text, e, e)` is the identity for well-formed
/// input.
pub fn transcode(text: &str, from: TextEncoding, to: TextEncoding) -> Result<String, CodecError> {
    let bytes = decode(text, from)?;
    encode(&bytes, to)
}

fn decode(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Base64 => Ok(BASE64.decode(text)?),
        TextEncoding::Hex => Ok(hex::decode(text)?),
    }
}

fn encode(bytes: &[u8], encoding: TextEncoding) -> Result<String, CodecError> {
    match encoding {
        TextEncoding::Utf8 => Ok(String::from_utf8(bytes.to_vec())?),
        TextEncoding::Base64 => Ok(BASE64.encode(bytes)),
        TextEncoding::Hex => Ok(hex::encode(bytes)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_utf8_base64_round_trip() {
        let header = "-----BEGIN RSA PUBLIC KEY-----";
        let armored = transcode(header, TextEncoding::Utf8, TextEncoding::Base64).unwrap();
        let restored = transcode(&armored, TextEncoding::Base64, TextEncoding::Utf8).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn test_hex_round_trip() {
        let hexed = transcode("key text", TextEncoding::Utf8, TextEncoding::Hex).unwrap();
        assert_eq!(hexed, "6b65792074657874");
        let restored = transcode(&hexed, TextEncoding::Hex, TextEncoding::Utf8).unwrap();
        assert_eq!(restored, "key text");
    }

    #[test]
    fn test_identity_transcode() {
        let same = transcode("plain", TextEncoding::Utf8, TextEncoding::Utf8).unwrap();
        assert_eq!(same, "plain");
    }

    #[test]
    fn test_invalid_input_is_an_error() {
        assert!(matches!(
            transcode("not base64!!!", TextEncoding::Base64, TextEncoding::Utf8),
            Err(CodecError::Base64(_))
        ));
        assert!(matches!(
            transcode("zz", TextEncoding::Hex, TextEncoding::Utf8),
            Err(CodecError::Hex(_))
        ));
    }
}
