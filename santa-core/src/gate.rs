use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::{Assignment, AuthError};

/// Argon2id cost parameters used when a new secret is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted one-way hashing of assignment secrets.
///
/// New hashes are Argon2id PHC strings, so verification uses the parameters recorded in
/// the stored hash rather than the current [`HashCost`].
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    pub fn new(cost: HashCost) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    /// Constant-time check of `secret` against a stored hash: an Argon2 PHC
    /// string, or a bcrypt hash from documents written before Argon2 was used.
    pub fn verify(&self, secret: &str, stored: &str) -> Result<bool, AuthError> {
        if is_bcrypt(stored) {
            return bcrypt::verify(secret, stored).map_err(|e| AuthError::Hash(e.to_string()));
        }
        let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Hash(e.to_string()))?;
        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Hash(e.to_string())),
        }
    }
}

fn is_bcrypt(stored: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| stored.starts_with(prefix))
}

/// Outcome of a successful reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub receiver: String,
    /// The submitted secret was committed by this call.
    pub claimed: bool,
}

/// Shows the receiver of `assignment`, claiming it with `submitted` when no
/// secret has been set yet.
pub fn reveal(
    assignment: &mut Assignment,
    submitted: &str,
    hasher: &SecretHasher,
) -> Result<Reveal, AuthError> {
    if let Some(stored) = assignment.password_hash.as_deref() {
        if !hasher.verify(submitted, stored)? {
            return Err(AuthError::WrongSecret);
        }
        return Ok(Reveal {
            receiver: assignment.receiver.clone(),
            claimed: false,
        });
    }

    assignment.password_hash = Some(hasher.hash(submitted)?);
    assignment.has_access = true;
    Ok(Reveal {
        receiver: assignment.receiver.clone(),
        claimed: true,
    })
}
