//! Test doubles for the platform, the resolver and the sink.

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
  audio::sink::{AudioSink, CompletionHook},
  common::types::{AnyResult, ChannelId, UserId},
  gateway::{VoiceHandle, VoicePlatform},
  sources::{MediaResolver, ResolvedTrack},
};

#[derive(Default)]
struct SinkState {
  loaded: Option<PathBuf>,
  paused: bool,
  hook: Option<CompletionHook>,
  started: Vec<PathBuf>,
  refused: HashSet<PathBuf>,
  releases: usize,
}

/// Sink that plays nothing; tests end tracks with [`MockSink::finish`].
#[derive(Default)]
pub struct MockSink {
  state: Mutex<SinkState>,
}

impl MockSink {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Ends the loaded track naturally. Returns false if nothing was loaded.
  pub fn finish(&self) -> bool {
    self.end_with(None)
  }

  pub fn fail(&self, error: &str) -> bool {
    self.end_with(Some(error.to_string()))
  }

  fn end_with(&self, error: Option<String>) -> bool {
    let hook = {
      let mut state = self.state.lock();
      if state.loaded.take().is_none() {
        return false;
      }
      state.paused = false;
      state.hook.take()
    };
    if let Some(hook) = hook {
      hook(error);
    }
    true
  }

  pub fn refuse(&self, path: &Path) {
    self.state.lock().refused.insert(path.to_path_buf());
  }

  pub fn started(&self) -> Vec<PathBuf> {
    self.state.lock().started.clone()
  }

  pub fn loaded(&self) -> Option<PathBuf> {
    self.state.lock().loaded.clone()
  }

  pub fn release_count(&self) -> usize {
    self.state.lock().releases
  }
}

impl AudioSink for MockSink {
  fn play(&self, path: &Path, on_complete: CompletionHook) -> AnyResult<()> {
    let mut state = self.state.lock();
    if state.refused.contains(path) {
      return Err(format!("cannot decode {}", path.display()).into());
    }
    state.loaded = Some(path.to_path_buf());
    state.paused = false;
    state.hook = Some(on_complete);
    state.started.push(path.to_path_buf());
    Ok(())
  }

  fn pause(&self) {
    let mut state = self.state.lock();
    if state.loaded.is_some() {
      state.paused = true;
    }
  }

  fn resume(&self) {
    self.state.lock().paused = false;
  }

  fn stop(&self) {
    self.end_with(None);
  }

  fn is_playing(&self) -> bool {
    let state = self.state.lock();
    state.loaded.is_some() && !state.paused
  }

  fn is_paused(&self) -> bool {
    let state = self.state.lock();
    state.loaded.is_some() && state.paused
  }

  fn release(&self) {
    self.state.lock().releases += 1;
  }
}

/// In-memory platform: presence is whatever the test says it is.
#[derive(Default)]
pub struct MockPlatform {
  voice: Mutex<HashMap<UserId, ChannelId>>,
  sinks: Mutex<Vec<Arc<MockSink>>>,
  moves: AtomicUsize,
  disconnects: AtomicUsize,
}

impl MockPlatform {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn set_voice(&self, user: UserId, channel: Option<ChannelId>) {
    let mut voice = self.voice.lock();
    match channel {
      Some(channel) => voice.insert(user, channel),
      None => voice.remove(&user),
    };
  }

  /// Sink of the most recent connection.
  pub fn sink(&self) -> Arc<MockSink> {
    self.sinks.lock().last().cloned().expect("no voice connection was made")
  }

  pub fn connects(&self) -> usize {
    self.sinks.lock().len()
  }

  pub fn moves(&self) -> usize {
    self.moves.load(Ordering::SeqCst)
  }

  pub fn disconnects(&self) -> usize {
    self.disconnects.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl VoicePlatform for MockPlatform {
  async fn connect(&self, channel: ChannelId) -> AnyResult<VoiceHandle> {
    let sink = MockSink::new();
    self.sinks.lock().push(sink.clone());
    Ok(VoiceHandle::new(channel, sink))
  }

  async fn move_to(&self, handle: &mut VoiceHandle, channel: ChannelId) -> AnyResult<()> {
    self.moves.fetch_add(1, Ordering::SeqCst);
    handle.channel_id = channel;
    Ok(())
  }

  async fn disconnect(&self, _handle: VoiceHandle) -> AnyResult<()> {
    self.disconnects.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn members_of(&self, channel: ChannelId) -> Vec<UserId> {
    self
      .voice
      .lock()
      .iter()
      .filter(|(_, c)| **c == channel)
      .map(|(u, _)| *u)
      .collect()
  }

  fn voice_channel_of(&self, user: UserId) -> Option<ChannelId> {
    self.voice.lock().get(&user).copied()
  }
}

/// Resolver that derives metadata from the URL and writes a tiny file.
#[derive(Default)]
pub struct MockResolver {
  failing: Mutex<HashSet<String>>,
  gates: Mutex<HashMap<String, flume::Receiver<()>>>,
  fetches: AtomicUsize,
}

impl MockResolver {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn fail(&self, url: &str) {
    self.failing.lock().insert(url.to_string());
  }

  /// Makes the resolve step for `url` block until the returned sender fires.
  pub fn hold(&self, url: &str) -> flume::Sender<()> {
    let (tx, rx) = flume::bounded(1);
    self.gates.lock().insert(url.to_string(), rx);
    tx
  }

  pub fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }

  fn id_of(url: &str) -> String {
    url
      .rsplit(['/', '='])
      .next()
      .unwrap_or("unknown")
      .to_string()
  }
}

impl MediaResolver for MockResolver {
  fn name(&self) -> &str {
    "mock"
  }

  fn can_handle(&self, url: &str) -> bool {
    url.starts_with("https://")
  }

  fn resolve(&self, url: &str) -> AnyResult<ResolvedTrack> {
    let gate = self.gates.lock().remove(url);
    if let Some(gate) = gate {
      let _ = gate.recv();
    }
    if self.failing.lock().contains(url) {
      return Err(format!("video unavailable: {url}").into());
    }
    let id = Self::id_of(url);
    Ok(ResolvedTrack {
      title: format!("Song {id}"),
      author: "Mock Artist".to_string(),
      identifier: id,
      length_ms: Some(180_000),
    })
  }

  fn fetch(&self, _url: &str, dest: &Path) -> AnyResult<()> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    std::fs::write(dest, b"ID3 mock audio")?;
    Ok(())
  }
}
