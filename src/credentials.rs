use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// CredentialError
///
/// Raised only while *producing* hashes. Verification never errors: malformed input simply
/// fails to verify.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid hash cost: {0}")]
    InvalidCost(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// HashCost
///
/// Argon2id work parameters. The default is deliberately slow, in the same latency class
/// as bcrypt at cost 12, trading login latency for resistance to offline guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory per hash, in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl HashCost {
    /// Whether this cost is at least as expensive as `floor` in both memory and passes.
    pub fn is_at_least(&self, floor: &HashCost) -> bool {
        self.memory_kib >= floor.memory_kib && self.iterations >= floor.iterations
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            lanes: 1,
        }
    }
}

/// CredentialVerifier
///
/// Hashes and verifies passwords. Each call to [`CredentialVerifier::hash`] draws a fresh
/// salt from the OS CSPRNG, so hashing the same plaintext twice yields two different PHC
/// strings which both verify. Verification reads the cost from the stored PHC string, so
/// hashes produced under an older cost keep working after the default is raised.
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    cost: HashCost,
    // Hash of a throwaway secret, verified against when the username is unknown so that
    // "no such user" costs the same as "wrong password".
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(cost: HashCost) -> Result<Self, CredentialError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.lanes, None)
            .map_err(|e| CredentialError::InvalidCost(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"pawnshop-timing-equalizer", &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();

        Ok(Self {
            argon2,
            cost,
            dummy_hash,
        })
    }

    /// hash
    ///
    /// Produces a salted Argon2id PHC string (`$argon2id$v=19$m=...`).
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// verify
    ///
    /// Returns `false` for a wrong password *and* for a hash that does not parse. The digest
    /// comparison itself is constant-time.
    ///
    /// Accounts created before the switch to Argon2id still carry bcrypt hashes
    /// (`$2a$`, `$2b$`, `$2y$`); those are checked with bcrypt at the cost stored in the hash.
    pub fn verify(&self, plaintext: &str, credential_hash: &str) -> bool {
        if is_bcrypt(credential_hash) {
            return bcrypt::verify(plaintext, credential_hash).unwrap_or(false);
        }
        match PasswordHash::new(credential_hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Burns one verification's worth of work. Used on the unknown-username path of login.
    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, &self.dummy_hash);
    }
}

fn is_bcrypt(credential_hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| credential_hash.starts_with(prefix))
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
