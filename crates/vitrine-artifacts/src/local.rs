//! Local filesystem artifact store.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use vitrine_core::{store::ArtifactStore, value::ArtifactRef};

use crate::{Error, Result, fresh_key};

/// Stores each artifact as a file at `{root}/{reference}`.
///
/// References are relative, `/`-separated keys such as
/// `products/4f1c…-chair.png`, so they double as URL paths under the static
/// `/uploads` mount.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
  root: PathBuf,
}

impl LocalArtifactStore {
  /// Create a store at `root`, creating the directory if needed.
  pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
    let root = root.as_ref().to_path_buf();
    fs::create_dir_all(&root).await?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve a reference to a path strictly inside the root.
  fn path_of(&self, reference: &str) -> Result<PathBuf> {
    let rel = Path::new(reference);
    let normal = !reference.is_empty()
      && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !normal {
      return Err(Error::InvalidReference(reference.to_owned()));
    }
    Ok(self.root.join(rel))
  }
}

impl ArtifactStore for LocalArtifactStore {
  type Error = Error;

  async fn store(&self, bytes: Bytes, suggested_name: String) -> Result<ArtifactRef> {
    let key = fresh_key(&suggested_name);
    let path = self.path_of(&key)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::write(&path, &bytes).await?;
    tracing::debug!(reference = %key, size = bytes.len(), "stored artifact");
    Ok(ArtifactRef::new(key))
  }

  async fn delete(&self, reference: ArtifactRef) -> Result<()> {
    let path = self.path_of(reference.as_str())?;
    match fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
