//! Track Store: the bounded play queue plus the reservations held by
//! downloads that have not finished yet.

use std::{
  collections::VecDeque,
  io,
  path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
  common::JukeboxError,
  player::state::{Track, TrackInfo},
};

/// A queue slot held by a download that is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
  pub job: u64,
  pub url: String,
}

#[derive(Debug)]
pub struct TrackStore {
  queue: VecDeque<Track>,
  pending: Vec<PendingFetch>,
  limit: usize,
  next_job: u64,
}

impl TrackStore {
  pub fn new(limit: usize) -> Self {
    Self {
      queue: VecDeque::with_capacity(limit),
      pending: Vec::new(),
      limit,
      next_job: 1,
    }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  /// Number of queued (downloaded) tracks.
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  /// Queued tracks plus outstanding reservations.
  pub fn occupied(&self) -> usize {
    self.queue.len() + self.pending.len()
  }

  pub fn is_downloading(&self) -> bool {
    !self.pending.is_empty()
  }

  pub fn contains_url(&self, url: &str) -> bool {
    self.queue.iter().any(|t| t.source_url == url) || self.pending.iter().any(|p| p.url == url)
  }

  pub fn contains_info(&self, info: &TrackInfo) -> bool {
    self.queue.iter().any(|t| &t.info == info)
  }

  /// Capacity and duplicate-URL checks, without taking a slot.
  pub fn check_admission(&self, url: &str) -> Result<(), JukeboxError> {
    if self.occupied() >= self.limit {
      return Err(JukeboxError::QueueFull { limit: self.limit });
    }
    if self.contains_url(url) {
      return Err(JukeboxError::DuplicateTrack);
    }
    Ok(())
  }

  /// Takes a slot for a download of `url` and returns its job number.
  pub fn reserve(&mut self, url: &str) -> Result<u64, JukeboxError> {
    self.check_admission(url)?;
    let job = self.next_job;
    self.next_job += 1;
    self.pending.push(PendingFetch {
      job,
      url: url.to_string(),
    });
    Ok(job)
  }

  /// Gives back the slot held by `job`.
  pub fn release(&mut self, job: u64) -> Option<PendingFetch> {
    let idx = self.pending.iter().position(|p| p.job == job)?;
    Some(self.pending.remove(idx))
  }

  /// Inserts a finished track at the back, or at the front when `bump`.
  pub fn insert(&mut self, track: Track, bump: bool) -> Result<(), JukeboxError> {
    if self.occupied() >= self.limit {
      return Err(JukeboxError::QueueFull { limit: self.limit });
    }
    if self.contains_url(&track.source_url) || self.contains_info(&track.info) {
      return Err(JukeboxError::DuplicateTrack);
    }

    debug!(
      "Queued '{}' at {} (len {})",
      track.info.title,
      if bump { "front" } else { "back" },
      self.queue.len() + 1
    );

    if bump {
      self.queue.push_front(track);
    } else {
      self.queue.push_back(track);
    }
    Ok(())
  }

  pub fn pop_next(&mut self) -> Option<Track> {
    self.queue.pop_front()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Track> {
    self.queue.iter()
  }

  /// Empties the queue and forgets every reservation.
  pub fn drain(&mut self) -> Vec<Track> {
    self.pending.clear();
    self.queue.drain(..).collect()
  }
}

/// Best-effort removal of a track file. A missing file is not an error.
pub fn discard_file(path: &Path) {
  match std::fs::remove_file(path) {
    Ok(()) => debug!("Deleted {}", path.display()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
  }
}

/// Creates `dir` if needed and deletes every file left in it.
pub fn purge_dir(dir: &Path) -> io::Result<usize> {
  std::fs::create_dir_all(dir)?;

  let mut removed = 0;
  for entry in std::fs::read_dir(dir)? {
    let path: PathBuf = entry?.path();
    if path.is_file() {
      discard_file(&path);
      removed += 1;
    }
  }
  Ok(removed)
}
