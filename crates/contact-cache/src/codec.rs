//! Bundle serialization: JSON, zlib, then base64 so the value fits a
//! string-keyed store.

use crate::{CacheError, CacheResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use contact_types::ContactBundle;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Format tag prepended to every encoded bundle.
const FORMAT_PREFIX: &str = "z1:";

/// Upper bound on the decompressed bundle size.
const MAX_BUNDLE_JSON_BYTES: u64 = 64 * 1024 * 1024;

/// Serialize and compress a bundle.
pub fn encode_bundle(bundle: &ContactBundle) -> CacheResult<String> {
    let json = serde_json::to_vec(bundle)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    Ok(format!("{}{}", FORMAT_PREFIX, STANDARD.encode(compressed)))
}

/// Decompress and parse a bundle produced by [`encode_bundle`].
pub fn decode_bundle(encoded: &str) -> CacheResult<ContactBundle> {
    let payload = encoded
        .trim()
        .strip_prefix(FORMAT_PREFIX)
        .ok_or_else(|| CacheError::Encoding("unknown cache format".to_string()))?;

    let compressed = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| CacheError::Encoding(format!("base64: {}", e)))?;

    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .take(MAX_BUNDLE_JSON_BYTES + 1)
        .read_to_end(&mut json)
        .map_err(|e| CacheError::Encoding(format!("zlib: {}", e)))?;
    if json.len() as u64 > MAX_BUNDLE_JSON_BYTES {
        return Err(CacheError::Encoding(format!(
            "bundle too large ({} bytes)",
            json.len()
        )));
    }

    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_types::Contact;

    #[test]
    fn test_encoded_bundle_is_smaller_than_json_for_repetitive_data() {
        let contacts: Vec<Contact> = (0..200)
            .map(|i| Contact::new(format!("contact-{}", i), format!("{}@c.us", i)))
            .collect();
        let bundle = ContactBundle::capture(contacts);

        let encoded = encode_bundle(&bundle).unwrap();
        let json_len = serde_json::to_string(&bundle).unwrap().len();

        assert!(encoded.starts_with(FORMAT_PREFIX));
        assert!(encoded.len() < json_len);
        assert_eq!(decode_bundle(&encoded).unwrap(), bundle);
    }

    #[test]
    fn test_decode_rejects_unknown_prefix() {
        assert!(matches!(
            decode_bundle("[{\"id\":\"x\"}]"),
            Err(CacheError::Encoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_corrupt_payload() {
        assert!(matches!(
            decode_bundle("z1:!!!not-base64!!!"),
            Err(CacheError::Encoding(_))
        ));
        let not_zlib = format!("z1:{}", STANDARD.encode(b"plain bytes"));
        assert!(matches!(
            decode_bundle(&not_zlib),
            Err(CacheError::Encoding(_))
        ));
    }
}
