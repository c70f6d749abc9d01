// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Checks administrator passwords against the configured SHA-256 digest.
#[derive(Clone)]
pub struct AdminGate {
	password_sha256: String,
}

impl AdminGate {
	/// Takes the hex digest of the password. Case doesn't matter.
	pub fn new(password_sha256: &str) -> Self {
		Self {
			password_sha256: password_sha256.to_ascii_lowercase(),
		}
	}

	pub fn verify(&self, password: &str) -> bool {
		let candidate = format!("{:x}", Sha256::digest(password.as_bytes()));
		candidate.as_bytes().ct_eq(self.password_sha256.as_bytes()).into()
	}
}

impl fmt::Debug for AdminGate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AdminGate").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const FUTURE2024_SHA256: &str = "37bf280c174cb643984f1491c25c18947478da05f72ed1124b0cb137f8ed5683";

	#[test]
	fn accepts_only_the_matching_password() {
		let gate = AdminGate::new(FUTURE2024_SHA256);
		assert!(gate.verify("future2024"));
		assert!(!gate.verify("future2025"));
		assert!(!gate.verify(""));
		assert!(!gate.verify("future2024 "));
	}

	#[test]
	fn digest_case_is_ignored() {
		let gate = AdminGate::new(&FUTURE2024_SHA256.to_ascii_uppercase());
		assert!(gate.verify("future2024"));
	}

	#[test]
	fn debug_output_hides_the_digest() {
		let gate = AdminGate::new(FUTURE2024_SHA256);
		assert!(!format!("{:?}", gate).contains("37bf"));
	}
}
