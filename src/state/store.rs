// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Somewhere the serialized display state record can be kept between runs.
pub trait StateStore: fmt::Debug + Send + Sync {
	/// Reads the stored record, or `None` if nothing has been stored yet.
	fn read(&self) -> io::Result<Option<String>>;

	/// Replaces the stored record.
	fn write(&self, contents: &str) -> io::Result<()>;
}

/// Stores the record in a JSON file. Writes go to a sibling temporary file which is then renamed over the target, so
/// a crash mid-write leaves the previous record intact.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn temporary_path(&self) -> PathBuf {
		let mut file_name = self.path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
		file_name.push(".tmp");
		self.path.with_file_name(file_name)
	}
}

impl StateStore for FileStore {
	fn read(&self) -> io::Result<Option<String>> {
		match fs::read_to_string(&self.path) {
			Ok(contents) => Ok(Some(contents)),
			Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
			Err(error) => Err(error),
		}
	}

	fn write(&self, contents: &str) -> io::Result<()> {
		let temporary_path = self.temporary_path();
		fs::write(&temporary_path, contents)?;
		fs::rename(&temporary_path, &self.path)
	}
}

/// Keeps the record in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
	contents: Mutex<Option<String>>,
	read_only: bool,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_contents(contents: impl Into<String>) -> Self {
		Self {
			contents: Mutex::new(Some(contents.into())),
			read_only: false,
		}
	}

	/// A store whose writes always fail, standing in for unavailable storage.
	pub fn read_only(contents: Option<String>) -> Self {
		Self {
			contents: Mutex::new(contents),
			read_only: true,
		}
	}

	pub fn contents(&self) -> Option<String> {
		self.contents.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}
}

impl StateStore for MemoryStore {
	fn read(&self) -> io::Result<Option<String>> {
		Ok(self.contents())
	}

	fn write(&self, contents: &str) -> io::Result<()> {
		if self.read_only {
			return Err(io::Error::new(ErrorKind::PermissionDenied, "state store is read-only"));
		}
		*self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn file_store_reads_nothing_before_first_write() {
		let directory = tempfile::tempdir().unwrap();
		let store = FileStore::new(directory.path().join("state.json"));
		assert_eq!(store.read().unwrap(), None);
	}

	#[test]
	fn file_store_replaces_previous_record() {
		let directory = tempfile::tempdir().unwrap();
		let store = FileStore::new(directory.path().join("state.json"));
		store.write("{\"goal\":1}").unwrap();
		store.write("{\"goal\":2}").unwrap();
		assert_eq!(store.read().unwrap().as_deref(), Some("{\"goal\":2}"));
		assert!(!directory.path().join("state.json.tmp").exists());
	}

	#[test]
	fn file_store_surfaces_write_failures() {
		let directory = tempfile::tempdir().unwrap();
		let store = FileStore::new(directory.path().join("missing").join("state.json"));
		assert!(store.write("{}").is_err());
	}

	#[test]
	fn read_only_memory_store_rejects_writes() {
		let store = MemoryStore::read_only(Some(String::from("{}")));
		assert!(store.write("{\"goal\":3}").is_err());
		assert_eq!(store.read().unwrap().as_deref(), Some("{}"));
	}
}
