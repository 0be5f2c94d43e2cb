pub mod console;

use async_trait::async_trait;

use crate::{
  audio::sink::BoxedSink,
  common::types::{AnyResult, ChannelId, UserId},
};

pub use console::{CONSOLE_HELP, ConsoleCommand, ConsolePlatform, parse_command};

/// A live voice connection: the channel it sits in and the sink that plays
/// into it.
pub struct VoiceHandle {
  pub channel_id: ChannelId,
  pub sink: BoxedSink,
}

impl VoiceHandle {
  pub fn new(channel_id: ChannelId, sink: BoxedSink) -> Self {
    Self { channel_id, sink }
  }
}

impl std::fmt::Debug for VoiceHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("VoiceHandle")
      .field("channel_id", &self.channel_id)
      .finish_non_exhaustive()
  }
}

/// The hosting chat platform, as far as voice sessions are concerned.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
  async fn connect(&self, channel: ChannelId) -> AnyResult<VoiceHandle>;

  async fn move_to(&self, handle: &mut VoiceHandle, channel: ChannelId) -> AnyResult<()>;

  async fn disconnect(&self, handle: VoiceHandle) -> AnyResult<()>;

  /// Users currently in `channel`.
  fn members_of(&self, channel: ChannelId) -> Vec<UserId>;

  /// The voice channel `user` is in, if any.
  fn voice_channel_of(&self, user: UserId) -> Option<ChannelId>;
}
