//! Mailbox protocol of the session actor and the outcomes it replies with.

use std::fmt;

use tokio::sync::oneshot;

use crate::{
  common::{
    JukeboxError,
    types::{ChannelId, SessionId, UserId},
  },
  player::{
    engine::{PlayOutcome, TrackEnd},
    state::{PlaybackState, Track, TrackInfo},
  },
};

pub type Reply<T> = oneshot::Sender<Result<T, JukeboxError>>;

pub enum Command {
  Join {
    caller: UserId,
    reply: Reply<JoinOutcome>,
  },
  Leave {
    caller: UserId,
    reply: Reply<()>,
  },
  AddTrack {
    caller: UserId,
    url: String,
    bump: bool,
    reply: Reply<TrackInfo>,
  },
  ShowQueue {
    caller: UserId,
    reply: Reply<QueueSnapshot>,
  },
  Play {
    caller: UserId,
    reply: Reply<PlayOutcome>,
  },
  Pause {
    caller: UserId,
    reply: Reply<()>,
  },
  Resume {
    caller: UserId,
    reply: Reply<()>,
  },
  Stop {
    caller: UserId,
    reply: Reply<()>,
  },
  Skip {
    caller: UserId,
    reply: Reply<Option<TrackInfo>>,
  },
  ToggleLoop {
    caller: UserId,
    reply: Reply<bool>,
  },
  VoiceStateUpdate {
    user: UserId,
  },
  Shutdown {
    reply: oneshot::Sender<()>,
  },
}

pub enum Message {
  Command(Command),
  TrackEnded {
    session: SessionId,
    end: TrackEnd,
  },
  DownloadFinished {
    session: SessionId,
    job: u64,
    bump: bool,
    result: Result<Track, String>,
    reply: Reply<TrackInfo>,
  },
  Tick,
  OwnerAbsenceCheck {
    session: SessionId,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
  Created(ChannelId),
  Moved(ChannelId),
  AlreadyConnected(ChannelId),
}

impl fmt::Display for JoinOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Created(c) | Self::Moved(c) => write!(
        f,
        "I have joined <#{c}>. Use /leave-voice to disconnect me. Use /add-song to add a song to the playlist"
      ),
      Self::AlreadyConnected(_) => f.write_str("I am already in the voice channel"),
    }
  }
}

/// Read-only view of the session for the playlist command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
  pub now_playing: Option<TrackInfo>,
  pub state: PlaybackState,
  pub loop_enabled: bool,
  pub queued: Vec<TrackInfo>,
  pub downloading: usize,
  pub limit: usize,
}

impl fmt::Display for QueueSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.now_playing {
      Some(info) => writeln!(f, "Currently playing: {info}")?,
      None => writeln!(f, "Currently playing: **None**")?,
    }
    writeln!(f)?;
    writeln!(f, "Next up:")?;
    if self.queued.is_empty() {
      write!(f, "*Playlist Empty*")?;
    } else {
      for (i, info) in self.queued.iter().enumerate() {
        if i > 0 {
          writeln!(f)?;
        }
        write!(f, "{}. {}", i + 1, info)?;
      }
    }
    if self.downloading > 0 {
      write!(f, "\n({} downloading)", self.downloading)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_queue_snapshot_text() {
    let mut snapshot = QueueSnapshot {
      now_playing: None,
      state: PlaybackState::Idle,
      loop_enabled: false,
      queued: vec![],
      downloading: 0,
      limit: 10,
    };
    assert_eq!(
      snapshot.to_string(),
      "Currently playing: **None**\n\nNext up:\n*Playlist Empty*"
    );

    snapshot.now_playing = Some(TrackInfo::new("A", "X"));
    snapshot.queued = vec![TrackInfo::new("B", "Y"), TrackInfo::new("C", "Z")];
    snapshot.downloading = 1;
    assert_eq!(
      snapshot.to_string(),
      "Currently playing: **A** - *X*\n\nNext up:\n1. **B** - *Y*\n2. **C** - *Z*\n(1 downloading)"
    );
  }
}
