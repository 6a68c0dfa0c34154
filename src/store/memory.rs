//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialRecord, CredentialStore},
};

/// Thread-safe store that keeps credentials in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<CredentialRecord>>);
impl MemoryStore {
	/// Creates a store pre-seeded with the provided record.
	pub fn with_record(record: CredentialRecord) -> Self {
		Self(Arc::new(RwLock::new(record)))
	}

	/// Returns a snapshot of the current record.
	pub fn snapshot(&self) -> CredentialRecord {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn access_token(&self) -> Option<String> {
		self.0.read().access_token.clone()
	}

	fn refresh_token(&self) -> Option<String> {
		self.0.read().refresh_token.clone()
	}

	fn csrf_token(&self) -> Option<String> {
		self.0.read().csrf_token.clone()
	}

	fn remembered_identifier(&self) -> Option<String> {
		self.0.read().remembered_identifier.clone()
	}

	fn store_tokens(&self, access_token: &str, refresh_token: &str) {
		let mut guard = self.0.write();

		guard.access_token = Some(access_token.to_owned());
		guard.refresh_token = Some(refresh_token.to_owned());
	}

	fn store_csrf_token(&self, token: &str) {
		self.0.write().csrf_token = Some(token.to_owned());
	}

	fn remember_identifier(&self, identifier: &str) {
		self.0.write().remembered_identifier = Some(identifier.to_owned());
	}

	fn forget_identifier(&self) {
		self.0.write().remembered_identifier = None;
	}

	fn clear_session(&self) {
		self.0.write().clear_session();
	}
}
