use tokio::time::Instant;
use tracing::info;

use crate::{
  common::{
    JukeboxError,
    types::{ChannelId, SessionId, UserId},
  },
  gateway::VoiceHandle,
  player::{
    engine::{Player, TrackEndNotifier},
    state::TrackInfo,
    store::{TrackStore, discard_file},
  },
  server::messages::QueueSnapshot,
};

/// The single live voice session.
pub struct Session {
  pub id: SessionId,
  pub owner: UserId,
  pub voice: VoiceHandle,
  pub last_activity: Instant,
  pub store: TrackStore,
  pub player: Player,
}

impl Session {
  pub fn new(
    id: SessionId,
    owner: UserId,
    voice: VoiceHandle,
    queue_limit: usize,
    notifier: TrackEndNotifier,
  ) -> Self {
    let player = Player::new(voice.sink.clone(), notifier);
    Self {
      id,
      owner,
      voice,
      last_activity: Instant::now(),
      store: TrackStore::new(queue_limit),
      player,
    }
  }

  pub fn channel(&self) -> ChannelId {
    self.voice.channel_id
  }

  pub fn require_owner(&self, caller: UserId) -> Result<(), JukeboxError> {
    if caller != self.owner {
      return Err(JukeboxError::NotOwner);
    }
    Ok(())
  }

  pub fn touch(&mut self) {
    self.last_activity = Instant::now();
  }

  pub fn is_downloading(&self) -> bool {
    self.store.is_downloading()
  }

  pub fn snapshot(&self) -> QueueSnapshot {
    QueueSnapshot {
      now_playing: self.player.current().map(|t| t.info.clone()),
      state: self.player.state(),
      loop_enabled: self.player.loop_enabled(),
      queued: self.store.iter().map(|t| t.info.clone()).collect::<Vec<TrackInfo>>(),
      downloading: self.store.occupied() - self.store.len(),
      limit: self.store.limit(),
    }
  }

  /// Stops playback, deletes every track file and hands back the voice
  /// connection for disconnecting.
  pub fn dismantle(mut self) -> VoiceHandle {
    info!(
      "Tearing down session {} (owner {}, {} queued)",
      self.id,
      self.owner,
      self.store.len()
    );

    if let Some(track) = self.player.shutdown() {
      discard_file(&track.local_path);
    }
    for track in self.store.drain() {
      discard_file(&track.local_path);
    }
    self.voice
  }
}
