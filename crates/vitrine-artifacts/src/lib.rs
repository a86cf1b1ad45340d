//! Artifact stores for uploaded files.
//!
//! [`LocalArtifactStore`] keeps files under a root directory that the server
//! also exposes read-only at `/uploads`. [`MemoryArtifactStore`] is for tests.

mod local;
mod memory;

pub mod error;

pub use error::{Error, Result};
pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

/// Reduce a client-supplied name to `[A-Za-z0-9._-]`, never empty and never
/// a dot-only segment.
pub(crate) fn sanitize_segment(raw: &str) -> String {
  let cleaned: String = raw
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
    .collect();
  if cleaned.chars().all(|c| c == '.') {
    "file".to_owned()
  } else {
    cleaned
  }
}

/// Split `suggested_name` into an optional directory and a file name, both
/// sanitised, and prefix the file name with a random id so keys never
/// collide.
pub(crate) fn fresh_key(suggested_name: &str) -> String {
  let (dir, file) = match suggested_name.rsplit_once('/') {
    Some((dir, file)) => (Some(dir), file),
    None => (None, suggested_name),
  };
  let file = format!("{}-{}", uuid::Uuid::new_v4().simple(), sanitize_segment(file));
  match dir.map(|d| {
    d.split('/')
      .filter(|s| !s.is_empty())
      .map(sanitize_segment)
      .collect::<Vec<_>>()
  }) {
    Some(segments) if !segments.is_empty() => format!("{}/{file}", segments.join("/")),
    _ => file,
  }
}
