use std::{fmt, path::PathBuf};

use serde::Serialize;

/// Display and dedup key of a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TrackInfo {
  pub title: String,
  pub author: String,
}

impl TrackInfo {
  pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      author: author.into(),
    }
  }
}

impl fmt::Display for TrackInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "**{}** - *{}*", self.title, self.author)
  }
}

/// A downloaded, playable track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
  pub info: TrackInfo,
  /// Resolver identifier (e.g. a YouTube video id).
  pub identifier: String,
  pub local_path: PathBuf,
  pub source_url: String,
  pub length_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
  Idle,
  Playing,
  Paused,
}

impl fmt::Display for PlaybackState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Idle => "idle",
      Self::Playing => "playing",
      Self::Paused => "paused",
    };
    f.write_str(s)
  }
}
