use std::path::Path;

use crate::common::types::AnyResult;

/// Metadata a resolver reports for a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
  pub title: String,
  pub author: String,
  /// Stable id used to name the downloaded file.
  pub identifier: String,
  pub length_ms: Option<u64>,
}

/// Trait that every remote media resolver implements.
///
/// Both calls block and may take a long time; callers run them on a blocking
/// worker, never on the session actor.
pub trait MediaResolver: Send + Sync {
  /// Unique identifier for this resolver (e.g. "yt-dlp").
  fn name(&self) -> &str;

  /// Whether this resolver understands `url` at all.
  fn can_handle(&self, url: &str) -> bool;

  /// Looks up title, author, id and duration without downloading.
  fn resolve(&self, url: &str) -> AnyResult<ResolvedTrack>;

  /// Downloads the audio of `url` to exactly `dest`.
  fn fetch(&self, url: &str, dest: &Path) -> AnyResult<()>;
}

pub type BoxedResolver = std::sync::Arc<dyn MediaResolver>;
