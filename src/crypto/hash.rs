use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, ParamsBuilder,
};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::error::{AppError, Result};

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 6;

/// One-way password hashing.
pub trait Hasher: Send + Sync {
    /// Hashes `value` into a self-describing string.
    fn hash(&self, value: &str) -> Result<String>;

    /// Checks `value` against a hash produced by [`Hasher::hash`].
    fn check(&self, value: &str, hash: &str) -> bool;
}

/// [`Hasher`] using Argon2id.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Creates a hasher with explicit cost parameters.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = ParamsBuilder::new()
            .m_cost(memory_kib)
            .t_cost(iterations)
            .p_cost(parallelism)
            .build()
            .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?;
        Ok(Self { params })
    }

    /// Creates a hasher with the production cost parameters.
    pub fn new() -> Result<Self> {
        Self::with_params(ARGON2_MEMORY_MB * 1024, ARGON2_ITERATIONS, ARGON2_PARALLELISM)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }
}

impl Hasher for Argon2Hasher {
    fn hash(&self, value: &str) -> Result<String> {
        let mut value_bytes = value.as_bytes().to_vec();

        let mut salt_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut salt_bytes);

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

        let hashed = self
            .argon2()
            .hash_password(&value_bytes, &salt)
            .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
            .to_string();

        value_bytes.zeroize();
        tracing::debug!("Password hashed successfully with Argon2");
        Ok(hashed)
    }

    fn check(&self, value: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            tracing::warn!("Stored password hash cannot be parsed");
            return false;
        };
        let mut value_bytes = value.as_bytes().to_vec();
        let verified = self
            .argon2()
            .verify_password(&value_bytes, &parsed_hash)
            .is_ok();
        value_bytes.zeroize();
        verified
    }
}
