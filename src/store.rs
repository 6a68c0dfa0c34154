//! Credential persistence contracts and built-in store implementations.
//!
//! The gateway reads and writes four string-valued keys: the access token, the
//! refresh token, the CSRF token, and the remembered sign-in identifier. All
//! operations are synchronous and last-write-wins; the only serialization the
//! gateway relies on is the refresh coordinator's in-flight flag.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Synchronous credential persistence contract consumed by the gateway.
///
/// `clear_session` removes the access, refresh, and CSRF tokens as a unit and
/// must preserve the remembered identifier; everything else is plain key/value
/// access.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored access token, if any.
	fn access_token(&self) -> Option<String>;

	/// Returns the stored refresh token, if any.
	fn refresh_token(&self) -> Option<String>;

	/// Returns the stored CSRF token, if any.
	fn csrf_token(&self) -> Option<String>;

	/// Returns the remembered sign-in identifier, if any.
	fn remembered_identifier(&self) -> Option<String>;

	/// Persists a freshly issued access + refresh token pair.
	fn store_tokens(&self, access_token: &str, refresh_token: &str);

	/// Persists a CSRF token captured from a response header.
	fn store_csrf_token(&self, token: &str);

	/// Persists the identifier the user asked to be remembered at sign-in.
	fn remember_identifier(&self, identifier: &str);

	/// Discards the remembered sign-in identifier.
	fn forget_identifier(&self);

	/// Removes the access, refresh, and CSRF tokens as one unit.
	///
	/// The remembered identifier survives so the sign-in form can prefill it
	/// after a forced logout.
	fn clear_session(&self);
}

/// Error type produced by persistent [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Snapshot of every credential key a store manages.
///
/// Shared by the in-memory and file-backed stores; the file store persists it
/// verbatim as its JSON snapshot.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Short-lived bearer credential.
	pub access_token: Option<String>,
	/// Longer-lived credential exchanged for new access tokens.
	pub refresh_token: Option<String>,
	/// Anti-forgery token echoed back on non-exempt requests.
	pub csrf_token: Option<String>,
	/// User-chosen sign-in identifier; survives session clearing.
	pub remembered_identifier: Option<String>,
}
impl CredentialRecord {
	/// Clears the three session-scoped tokens, preserving the identifier.
	pub fn clear_session(&mut self) {
		self.access_token = None;
		self.refresh_token = None;
		self.csrf_token = None;
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
			.field("remembered_identifier", &self.remembered_identifier)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clear_session_preserves_remembered_identifier() {
		let mut record = CredentialRecord {
			access_token: Some("access".into()),
			refresh_token: Some("refresh".into()),
			csrf_token: Some("csrf".into()),
			remembered_identifier: Some("user@example.com".into()),
		};

		record.clear_session();

		assert_eq!(record.access_token, None);
		assert_eq!(record.refresh_token, None);
		assert_eq!(record.csrf_token, None);
		assert_eq!(record.remembered_identifier.as_deref(), Some("user@example.com"));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let record = CredentialRecord {
			access_token: Some("super-secret".into()),
			refresh_token: None,
			csrf_token: None,
			remembered_identifier: Some("user@example.com".into()),
		};
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("super-secret"));
		assert!(rendered.contains("<redacted>"));
		assert!(rendered.contains("user@example.com"));
	}

	#[test]
	fn store_error_converts_into_gateway_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unplugged".into() };
		let gateway_error: Error = store_error.clone().into();

		assert!(matches!(gateway_error, Error::Storage(_)));
		assert!(gateway_error.to_string().contains("disk unplugged"));
	}
}
