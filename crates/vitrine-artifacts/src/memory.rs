//! In-memory artifact store (for tests).

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
};

use bytes::Bytes;
use vitrine_core::{store::ArtifactStore, value::ArtifactRef};

use crate::{Error, Result, fresh_key};

/// Thread-safe via `RwLock`. Not persistent; data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
  blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryArtifactStore {
  pub fn new() -> Self { Self::default() }

  pub fn contains(&self, reference: &ArtifactRef) -> bool {
    self
      .blobs
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(reference.as_str())
  }

  pub fn get(&self, reference: &ArtifactRef) -> Option<Bytes> {
    self
      .blobs
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(reference.as_str())
      .cloned()
  }

  /// Number of stored artifacts.
  pub fn len(&self) -> usize { self.blobs.read().unwrap_or_else(PoisonError::into_inner).len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl ArtifactStore for MemoryArtifactStore {
  type Error = Error;

  async fn store(&self, bytes: Bytes, suggested_name: String) -> Result<ArtifactRef> {
    let key = fresh_key(&suggested_name);
    self
      .blobs
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.clone(), bytes);
    Ok(ArtifactRef::new(key))
  }

  async fn delete(&self, reference: ArtifactRef) -> Result<()> {
    self
      .blobs
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(reference.as_str());
    Ok(())
  }
}
