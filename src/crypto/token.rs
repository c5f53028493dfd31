use base64::{Engine as _, engine::general_purpose};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Default number of random bytes in a token (256 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+";

/// Generates a crypto random token of `number_bytes` bytes, URL-safe base64 encoded.
pub fn generate_token(number_bytes: usize) -> String {
    let mut bytes = vec![0u8; number_bytes];
    OsRng.fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a token with [`DEFAULT_TOKEN_BYTES`] random bytes.
pub fn generate_token_default_length() -> String {
    generate_token(DEFAULT_TOKEN_BYTES)
}

/// Generates a random password of `length` characters.
pub fn generate_random_password(length: usize) -> String {
    (0..length)
        .map(|_| PASSWORD_CHARSET[OsRng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tokens_carry_256_bits() {
        let token = generate_token_default_length();
        let decoded = general_purpose::URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(decoded.len(), DEFAULT_TOKEN_BYTES);
        assert_ne!(token, generate_token_default_length());
    }

    #[test]
    fn passwords_use_the_charset() {
        let password = generate_random_password(40);
        assert_eq!(password.len(), 40);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
    }
}
