//! Simple file-backed [`CredentialStore`] for desktop shells and CLI sessions.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{CredentialRecord, CredentialStore, StoreError},
};

/// Persists the credential record to a JSON file after each mutation.
///
/// Writes are best-effort: a persistence failure never panics a caller mid
/// request. The last failure is retained and can be drained with
/// [`FileStore::take_persist_error`].
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<CredentialRecord>>,
	persist_error: Arc<Mutex<Option<StoreError>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { CredentialRecord::default() };

		Ok(Self {
			path,
			inner: Arc::new(RwLock::new(snapshot)),
			persist_error: Arc::new(Mutex::new(None)),
		})
	}

	/// Returns and clears the most recent persistence failure, if one occurred.
	pub fn take_persist_error(&self) -> Option<StoreError> {
		self.persist_error.lock().take()
	}

	fn load_snapshot(path: &Path) -> Result<CredentialRecord, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(CredentialRecord::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, record: &CredentialRecord) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate(&self, apply: impl FnOnce(&mut CredentialRecord)) {
		let mut guard = self.inner.write();

		apply(&mut guard);

		if let Err(e) = self.persist_locked(&guard) {
			*self.persist_error.lock() = Some(e);
		}
	}
}
impl CredentialStore for FileStore {
	fn access_token(&self) -> Option<String> {
		self.inner.read().access_token.clone()
	}

	fn refresh_token(&self) -> Option<String> {
		self.inner.read().refresh_token.clone()
	}

	fn csrf_token(&self) -> Option<String> {
		self.inner.read().csrf_token.clone()
	}

	fn remembered_identifier(&self) -> Option<String> {
		self.inner.read().remembered_identifier.clone()
	}

	fn store_tokens(&self, access_token: &str, refresh_token: &str) {
		self.mutate(|record| {
			record.access_token = Some(access_token.to_owned());
			record.refresh_token = Some(refresh_token.to_owned());
		});
	}

	fn store_csrf_token(&self, token: &str) {
		self.mutate(|record| record.csrf_token = Some(token.to_owned()));
	}

	fn remember_identifier(&self, identifier: &str) {
		self.mutate(|record| record.remembered_identifier = Some(identifier.to_owned()));
	}

	fn forget_identifier(&self) {
		self.mutate(|record| record.remembered_identifier = None);
	}

	fn clear_session(&self) {
		self.mutate(CredentialRecord::clear_session);
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process, time::{SystemTime, UNIX_EPOCH}};
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let stamp = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.expect("System clock should be past the epoch.")
			.as_nanos();
		let unique = format!("session_gateway_file_store_{}_{stamp}.json", process::id());

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store.store_tokens("A1", "R1");
		store.remember_identifier("user@example.com");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert_eq!(reopened.access_token().as_deref(), Some("A1"));
		assert_eq!(reopened.refresh_token().as_deref(), Some("R1"));
		assert_eq!(reopened.remembered_identifier().as_deref(), Some("user@example.com"));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn clearing_persists_and_keeps_identifier() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store.store_tokens("A1", "R1");
		store.store_csrf_token("C1");
		store.remember_identifier("user@example.com");
		store.clear_session();
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert_eq!(reopened.access_token(), None);
		assert_eq!(reopened.refresh_token(), None);
		assert_eq!(reopened.csrf_token(), None);
		assert_eq!(reopened.remembered_identifier().as_deref(), Some("user@example.com"));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store snapshot {}: {e}", path.display())
		});
	}
}
