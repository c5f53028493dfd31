use base64::{Engine as _, engine::general_purpose};

use crate::crypto::cypher::Cypher;
use crate::error::CypherError;

/// Encrypts `data` and frames it as URL-safe base64, ready to be used as a
/// cookie value.
pub fn encode_cookie(cypher: &dyn Cypher, data: &str) -> Result<String, CypherError> {
    let sealed = cypher.encrypt(data.as_bytes())?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(sealed))
}

/// Reverses [`encode_cookie`].
pub fn decode_cookie(cypher: &dyn Cypher, data: &str) -> Result<String, CypherError> {
    let sealed = general_purpose::URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|_| CypherError::MalformedCiphertext)?;
    let plaintext = cypher.decrypt(&sealed)?;
    String::from_utf8(plaintext).map_err(|_| CypherError::MalformedCiphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cypher::Aes256Cypher;

    #[test]
    fn cookie_values_round_trip_and_stay_url_safe() {
        let cypher = Aes256Cypher::random();
        let encoded = encode_cookie(&cypher, "user=42; admin").unwrap();

        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(decode_cookie(&cypher, &encoded).unwrap(), "user=42; admin");
    }

    #[test]
    fn garbage_is_rejected_as_malformed() {
        let cypher = Aes256Cypher::random();
        assert_eq!(
            decode_cookie(&cypher, "not base64!"),
            Err(CypherError::MalformedCiphertext)
        );
        assert_eq!(decode_cookie(&cypher, "AAAA"), Err(CypherError::MalformedCiphertext));
    }

    #[test]
    fn cookies_from_another_key_fail_authentication() {
        let encoded = encode_cookie(&Aes256Cypher::random(), "id").unwrap();
        assert_eq!(
            decode_cookie(&Aes256Cypher::random(), &encoded),
            Err(CypherError::AuthenticationFailure)
        );
    }
}
