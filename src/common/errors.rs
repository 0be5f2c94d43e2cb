use thiserror::Error;

use crate::common::types::UserId;

/// Broad category of a [`JukeboxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// The caller is not allowed to do this.
  Authorization,
  /// The session is not in a state that accepts the command.
  Precondition,
  /// A collaborator (resolver, platform, sink) failed.
  External,
}

/// Every failure a jukebox command can report back to the caller.
///
/// The `Display` text is what the bot sends to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JukeboxError {
  #[error("You must be in a voice channel to use this command")]
  NoVoiceContext,
  #[error("I am already in a voice channel with {owner}")]
  SessionBusy { owner: UserId },
  #[error("I am not in a voice channel")]
  NoSession,
  #[error("You must be the one who added me to the voice channel to use this command")]
  NotOwner,
  #[error("The playlist is currently limited to only {limit} songs. Use /skip-song to make space.")]
  QueueFull { limit: usize },
  #[error("Song already in playlist. Wait for it to play before adding it again")]
  DuplicateTrack,
  #[error("Not a supported link ({host})")]
  UnsupportedSource { host: String },
  #[error("I am already playing audio")]
  AlreadyPlaying,
  #[error("I am not playing audio")]
  NotPlaying,
  #[error("I am not paused")]
  NotPaused,
  #[error("Playlist is empty. Use /add-song to add songs")]
  QueueEmpty,
  #[error("Failed to download the song: {0}")]
  DownloadFailed(String),
  #[error("Voice connection failed: {0}")]
  Voice(String),
  #[error("The music service is not running")]
  Closed,
}

impl JukeboxError {
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::NotOwner | Self::SessionBusy { .. } => ErrorClass::Authorization,
      Self::DownloadFailed(_) | Self::Voice(_) | Self::Closed => ErrorClass::External,
      _ => ErrorClass::Precondition,
    }
  }
}
