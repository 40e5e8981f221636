//! Nonce generation for login sessions.

// crates.io
use rand::RngCore;

const NONCE_BYTES: usize = 16;

/// Source of single-use login nonces.
///
/// Injectable so tests can substitute deterministic sequences without weakening the
/// production default. Stores hand the generated value straight into authorization URLs, so
/// implementations must produce URL-safe strings.
pub trait NonceGenerator
where
	Self: Send + Sync,
{
	/// Returns a fresh nonce.
	fn generate(&self) -> String;
}

/// Default generator: 128 bits of CSPRNG output, encoded as 32 lowercase hex characters.
///
/// # Panics
///
/// Panics when the thread-local RNG cannot produce randomness. Entropy exhaustion is a
/// process-level fault, not a recoverable error.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecureNonceGenerator;
impl NonceGenerator for SecureNonceGenerator {
	fn generate(&self) -> String {
		let mut buf = [0_u8; NONCE_BYTES];

		rand::rng().fill_bytes(&mut buf);

		hex::encode(buf)
	}
}
