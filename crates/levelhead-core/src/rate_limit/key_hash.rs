//! API key hashing for bucket keys
//!
//! Raw API keys must never be stored as limiter map keys. Keys are run through
//! bcrypt at a low fixed cost with a salt drawn once per process, then SHA-256,
//! and the first 32 hex characters are used.

use sha2::{Digest, Sha256};

use crate::prelude::*;

const BCRYPT_COST: u32 = 4;
const HASH_LENGTH: usize = 32;

#[derive(Debug)]
pub struct KeyHasher {
	salt: [u8; 16],
}

impl KeyHasher {
	/// Create a hasher with a fresh random salt
	pub fn new() -> Self {
		Self { salt: rand::random() }
	}

	pub fn with_salt(salt: [u8; 16]) -> Self {
		Self { salt }
	}

	pub fn hash(&self, key: &str) -> ClResult<String> {
		let parts = bcrypt::hash_with_salt(key, BCRYPT_COST, self.salt)
			.map_err(|err| Error::Internal(format!("bcrypt: {}", err)))?;
		let digest = Sha256::digest(parts.format_for_version(bcrypt::Version::TwoB).as_bytes());
		let mut hex = hex::encode(digest);
		hex.truncate(HASH_LENGTH);
		Ok(hex)
	}
}

impl Default for KeyHasher {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_is_stable_per_salt() {
		let hasher = KeyHasher::with_salt([7; 16]);
		let a = hasher.hash("key-one").unwrap();
		assert_eq!(a.len(), 32);
		assert!(a.bytes().all(|b| b.is_ascii_hexdigit()));
		assert_eq!(a, hasher.hash("key-one").unwrap());
		assert_ne!(a, hasher.hash("key-two").unwrap());
	}

	#[test]
	fn test_salt_changes_hash() {
		let a = KeyHasher::with_salt([1; 16]).hash("key").unwrap();
		let b = KeyHasher::with_salt([2; 16]).hash("key").unwrap();
		assert_ne!(a, b);
	}
}

// vim: ts=4
