//! Playback Engine.
//!
//! Drives one [`AudioSink`] through the `Idle -> Playing <-> Paused` machine
//! and pulls tracks out of the [`TrackStore`]. Every track start bumps a
//! generation counter and the completion hook handed to the sink carries that
//! generation, so an end notification for a track that was already stopped,
//! skipped or replaced is recognised as stale and ignored.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
  audio::sink::{BoxedSink, CompletionHook},
  common::JukeboxError,
  player::{
    state::{PlaybackState, Track, TrackInfo},
    store::{TrackStore, discard_file},
  },
};

/// Sent by the sink (through the hook) when a track stops producing audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEnd {
  pub generation: u64,
  pub error: Option<String>,
}

pub type TrackEndNotifier = Arc<dyn Fn(TrackEnd) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
  Started(TrackInfo),
  Resumed,
}

/// What [`Player::on_track_end`] did with an end notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
  Stale,
  Replayed(TrackInfo),
  Advanced(TrackInfo),
  Idle,
}

pub struct Player {
  sink: BoxedSink,
  notifier: TrackEndNotifier,
  current: Option<Track>,
  loop_enabled: bool,
  generation: u64,
}

impl Player {
  pub fn new(sink: BoxedSink, notifier: TrackEndNotifier) -> Self {
    Self {
      sink,
      notifier,
      current: None,
      loop_enabled: false,
      generation: 0,
    }
  }

  pub fn state(&self) -> PlaybackState {
    if self.sink.is_paused() {
      PlaybackState::Paused
    } else if self.sink.is_playing() {
      PlaybackState::Playing
    } else {
      PlaybackState::Idle
    }
  }

  pub fn current(&self) -> Option<&Track> {
    self.current.as_ref()
  }

  pub fn loop_enabled(&self) -> bool {
    self.loop_enabled
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn play(&mut self, store: &mut TrackStore) -> Result<PlayOutcome, JukeboxError> {
    match self.state() {
      PlaybackState::Playing => Err(JukeboxError::AlreadyPlaying),
      PlaybackState::Paused => {
        self.sink.resume();
        Ok(PlayOutcome::Resumed)
      }
      PlaybackState::Idle => {
        if store.is_empty() {
          return Err(JukeboxError::QueueEmpty);
        }
        self.generation += 1;
        self.retire_current();
        self
          .start_next(store)
          .map(PlayOutcome::Started)
          .ok_or(JukeboxError::QueueEmpty)
      }
    }
  }

  pub fn pause(&mut self) -> Result<(), JukeboxError> {
    if self.state() != PlaybackState::Playing {
      return Err(JukeboxError::NotPlaying);
    }
    self.sink.pause();
    Ok(())
  }

  pub fn resume(&mut self) -> Result<(), JukeboxError> {
    if self.state() != PlaybackState::Paused {
      return Err(JukeboxError::NotPaused);
    }
    self.sink.resume();
    Ok(())
  }

  /// Halts the current track for good; it is not put back in the queue.
  pub fn stop(&mut self) -> Result<(), JukeboxError> {
    if self.state() == PlaybackState::Idle {
      return Err(JukeboxError::NotPlaying);
    }
    self.generation += 1;
    self.sink.stop();
    self.retire_current();
    Ok(())
  }

  /// Drops the current track (loop or not) and starts the next queued one.
  pub fn skip(&mut self, store: &mut TrackStore) -> Option<TrackInfo> {
    self.generation += 1;
    if self.state() != PlaybackState::Idle {
      self.sink.stop();
    }
    self.retire_current();
    self.start_next(store)
  }

  pub fn toggle_loop(&mut self) -> bool {
    self.loop_enabled = !self.loop_enabled;
    self.loop_enabled
  }

  pub fn on_track_end(&mut self, end: TrackEnd, store: &mut TrackStore) -> EndOutcome {
    if end.generation != self.generation || self.current.is_none() {
      debug!(
        "Ignoring stale track end (gen {} vs {})",
        end.generation, self.generation
      );
      return EndOutcome::Stale;
    }

    self.sink.release();

    if let Some(err) = &end.error {
      warn!("Track ended with sink error: {}", err);
    }

    let sink_idle = !self.sink.is_playing() && !self.sink.is_paused();
    if self.loop_enabled && end.error.is_none() && sink_idle {
      if let Some(track) = self.current.clone() {
        self.generation += 1;
        match self.sink.play(&track.local_path, self.hook()) {
          Ok(()) => {
            debug!("Looping '{}'", track.info.title);
            return EndOutcome::Replayed(track.info);
          }
          Err(e) => warn!("Failed to replay '{}': {}", track.info.title, e),
        }
      }
    }

    self.generation += 1;
    self.retire_current();
    match self.start_next(store) {
      Some(info) => EndOutcome::Advanced(info),
      None => EndOutcome::Idle,
    }
  }

  /// Stops the sink and hands back the current track so its file can be
  /// removed. Used by teardown.
  pub fn shutdown(&mut self) -> Option<Track> {
    self.generation += 1;
    if self.state() != PlaybackState::Idle {
      self.sink.stop();
    }
    self.sink.release();
    self.current.take()
  }

  fn hook(&self) -> CompletionHook {
    let generation = self.generation;
    let notifier = self.notifier.clone();
    Box::new(move |error| notifier(TrackEnd { generation, error }))
  }

  fn retire_current(&mut self) {
    if let Some(track) = self.current.take() {
      self.sink.release();
      discard_file(&track.local_path);
    }
  }

  /// Starts the first queued track the sink accepts. Tracks the sink refuses
  /// are treated as finished and discarded.
  fn start_next(&mut self, store: &mut TrackStore) -> Option<TrackInfo> {
    while let Some(track) = store.pop_next() {
      self.generation += 1;
      match self.sink.play(&track.local_path, self.hook()) {
        Ok(()) => {
          info!("Now playing '{}' by {}", track.info.title, track.info.author);
          let info = track.info.clone();
          self.current = Some(track);
          return Some(info);
        }
        Err(e) => {
          warn!("Sink refused '{}': {}", track.info.title, e);
          discard_file(&track.local_path);
        }
      }
    }
    self.current = None;
    None
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use parking_lot::Mutex;

  use super::*;
  use crate::testing::MockSink;

  struct Rig {
    _dir: tempfile::TempDir,
    root: PathBuf,
    sink: Arc<MockSink>,
    ends: Arc<Mutex<Vec<TrackEnd>>>,
    player: Player,
    store: TrackStore,
  }

  impl Rig {
    fn new() -> Self {
      let dir = tempfile::tempdir().unwrap();
      let root = dir.path().to_path_buf();
      let sink = MockSink::new();
      let ends = Arc::new(Mutex::new(Vec::new()));
      let recorded = ends.clone();
      let notifier: TrackEndNotifier = Arc::new(move |end| recorded.lock().push(end));
      Self {
        _dir: dir,
        root,
        player: Player::new(sink.clone(), notifier),
        sink,
        ends,
        store: TrackStore::new(10),
      }
    }

    fn add(&mut self, name: &str) -> PathBuf {
      let path = self.root.join(format!("{name}.mp3"));
      std::fs::write(&path, b"audio").unwrap();
      self
        .store
        .insert(
          Track {
            info: TrackInfo::new(name, "Artist"),
            identifier: name.to_string(),
            local_path: path.clone(),
            source_url: format!("https://youtu.be/{name}"),
            length_ms: Some(1000),
          },
          false,
        )
        .unwrap();
      path
    }

    /// Delivers the most recent recorded end notification to the player.
    fn deliver_last_end(&mut self) -> EndOutcome {
      let end = self.ends.lock().last().cloned().unwrap();
      self.player.on_track_end(end, &mut self.store)
    }

    fn finish_current(&mut self) -> EndOutcome {
      assert!(self.sink.finish());
      self.deliver_last_end()
    }
  }

  #[test]
  fn test_play_on_empty_queue_fails_without_state_change() {
    let mut rig = Rig::new();
    assert_eq!(
      rig.player.play(&mut rig.store),
      Err(JukeboxError::QueueEmpty)
    );
    assert_eq!(rig.player.state(), PlaybackState::Idle);
    assert_eq!(rig.player.generation(), 0);
    assert!(rig.sink.started().is_empty());
  }

  #[test]
  fn test_play_pause_resume_cycle() {
    let mut rig = Rig::new();
    rig.add("a");
    rig.add("b");

    assert_eq!(
      rig.player.play(&mut rig.store),
      Ok(PlayOutcome::Started(TrackInfo::new("a", "Artist")))
    );
    assert_eq!(rig.player.state(), PlaybackState::Playing);
    assert_eq!(
      rig.player.play(&mut rig.store),
      Err(JukeboxError::AlreadyPlaying)
    );

    rig.player.pause().unwrap();
    assert_eq!(rig.player.state(), PlaybackState::Paused);
    assert_eq!(rig.player.pause(), Err(JukeboxError::NotPlaying));

    assert_eq!(rig.player.play(&mut rig.store), Ok(PlayOutcome::Resumed));
    assert_eq!(rig.player.state(), PlaybackState::Playing);
    assert_eq!(rig.store.len(), 1);
    assert_eq!(rig.player.current().unwrap().info.title, "a");
  }

  #[test]
  fn test_resume_requires_pause() {
    let mut rig = Rig::new();
    rig.add("a");
    assert_eq!(rig.player.resume(), Err(JukeboxError::NotPaused));
    rig.player.play(&mut rig.store).unwrap();
    assert_eq!(rig.player.resume(), Err(JukeboxError::NotPaused));
    rig.player.pause().unwrap();
    rig.player.resume().unwrap();
    assert_eq!(rig.player.state(), PlaybackState::Playing);
  }

  #[test]
  fn test_stop_discards_current_and_ignores_its_end() {
    let mut rig = Rig::new();
    let a = rig.add("a");
    rig.add("b");
    rig.player.play(&mut rig.store).unwrap();

    rig.player.stop().unwrap();
    assert_eq!(rig.player.state(), PlaybackState::Idle);
    assert!(rig.player.current().is_none());
    assert!(!a.exists());

    // The sink fired the hook on stop; it must not advance the queue.
    assert_eq!(rig.deliver_last_end(), EndOutcome::Stale);
    assert_eq!(rig.store.len(), 1);
    assert_eq!(rig.player.stop(), Err(JukeboxError::NotPlaying));
  }

  #[test]
  fn test_natural_completion_advances_then_goes_idle() {
    let mut rig = Rig::new();
    let a = rig.add("a");
    let b = rig.add("b");
    rig.player.play(&mut rig.store).unwrap();

    assert_eq!(
      rig.finish_current(),
      EndOutcome::Advanced(TrackInfo::new("b", "Artist"))
    );
    assert!(!a.exists());
    assert_eq!(rig.finish_current(), EndOutcome::Idle);
    assert!(!b.exists());
    assert_eq!(rig.player.state(), PlaybackState::Idle);
    assert!(rig.player.current().is_none());
  }

  #[test]
  fn test_loop_replays_same_track_with_empty_queue() {
    let mut rig = Rig::new();
    let a = rig.add("a");
    rig.player.play(&mut rig.store).unwrap();
    assert!(rig.player.toggle_loop());

    for _ in 0..3 {
      assert_eq!(
        rig.finish_current(),
        EndOutcome::Replayed(TrackInfo::new("a", "Artist"))
      );
      assert_eq!(rig.player.state(), PlaybackState::Playing);
    }
    assert!(a.exists());
    assert_eq!(rig.sink.started().len(), 4);
    assert_eq!(rig.player.current().unwrap().info.title, "a");
  }

  #[test]
  fn test_skip_with_loop_still_discards() {
    let mut rig = Rig::new();
    let a = rig.add("a");
    rig.add("b");
    rig.player.toggle_loop();
    rig.player.play(&mut rig.store).unwrap();

    assert_eq!(
      rig.player.skip(&mut rig.store),
      Some(TrackInfo::new("b", "Artist"))
    );
    assert!(!a.exists());
    assert_eq!(rig.player.current().unwrap().info.title, "b");

    // End notification of the skipped track is stale; no double advance.
    let stale = rig.ends.lock().first().cloned().unwrap();
    assert_eq!(rig.player.on_track_end(stale, &mut rig.store), EndOutcome::Stale);
    assert_eq!(rig.player.current().unwrap().info.title, "b");

    assert_eq!(rig.player.skip(&mut rig.store), None);
    assert_eq!(rig.player.state(), PlaybackState::Idle);
  }

  #[test]
  fn test_sink_error_is_treated_as_completion() {
    let mut rig = Rig::new();
    rig.add("a");
    rig.add("b");
    rig.player.toggle_loop();
    rig.player.play(&mut rig.store).unwrap();

    rig.sink.fail("decoder crashed");
    assert_eq!(
      rig.deliver_last_end(),
      EndOutcome::Advanced(TrackInfo::new("b", "Artist"))
    );
  }

  #[test]
  fn test_refused_tracks_are_skipped() {
    let mut rig = Rig::new();
    let bad = rig.add("bad");
    rig.add("good");
    rig.sink.refuse(&bad);

    assert_eq!(
      rig.player.play(&mut rig.store),
      Ok(PlayOutcome::Started(TrackInfo::new("good", "Artist")))
    );
    assert!(!bad.exists());
  }

  #[test]
  fn test_shutdown_returns_current() {
    let mut rig = Rig::new();
    rig.add("a");
    rig.player.play(&mut rig.store).unwrap();
    let track = rig.player.shutdown().unwrap();
    assert_eq!(track.info.title, "a");
    assert_eq!(rig.player.state(), PlaybackState::Idle);
    assert!(rig.sink.release_count() >= 1);
    assert!(rig.player.shutdown().is_none());
  }
}
