use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{VoiceHandle, VoicePlatform};
use crate::{
  audio::{DecoderSink, PcmFrame},
  common::types::{AnyResult, ChannelId, UserId},
};

/// Stand-alone platform driven from the terminal.
///
/// Voice presence is whatever `voice` commands set, and the decoded audio is
/// consumed by a background task that only accounts for it.
#[derive(Default)]
pub struct ConsolePlatform {
  presence: RwLock<HashMap<UserId, ChannelId>>,
}

impl ConsolePlatform {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Moves `user` into `channel`, or out of voice when `None`.
  pub fn set_voice_state(&self, user: UserId, channel: Option<ChannelId>) {
    let mut presence = self.presence.write();
    match channel {
      Some(channel) => {
        presence.insert(user, channel);
      }
      None => {
        presence.remove(&user);
      }
    }
  }

  fn spawn_transport(channel: ChannelId, frames: flume::Receiver<PcmFrame>) {
    tokio::spawn(async move {
      let mut samples: u64 = 0;
      while let Ok(frame) = frames.recv_async().await {
        samples += frame.samples.len() as u64;
      }
      debug!("Voice transport for {} closed after {} samples", channel, samples);
    });
  }
}

#[async_trait]
impl VoicePlatform for ConsolePlatform {
  async fn connect(&self, channel: ChannelId) -> AnyResult<VoiceHandle> {
    let (sink, frames) = DecoderSink::new();
    Self::spawn_transport(channel, frames);
    info!("Connected to voice channel {}", channel);
    Ok(VoiceHandle::new(channel, Arc::new(sink)))
  }

  async fn move_to(&self, handle: &mut VoiceHandle, channel: ChannelId) -> AnyResult<()> {
    info!("Moving from voice channel {} to {}", handle.channel_id, channel);
    handle.channel_id = channel;
    Ok(())
  }

  async fn disconnect(&self, handle: VoiceHandle) -> AnyResult<()> {
    handle.sink.stop();
    handle.sink.release();
    info!("Disconnected from voice channel {}", handle.channel_id);
    Ok(())
  }

  fn members_of(&self, channel: ChannelId) -> Vec<UserId> {
    self
      .presence
      .read()
      .iter()
      .filter(|(_, c)| **c == channel)
      .map(|(u, _)| *u)
      .collect()
  }

  fn voice_channel_of(&self, user: UserId) -> Option<ChannelId> {
    self.presence.read().get(&user).copied()
  }
}

/// One line typed into the console front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
  Join(UserId),
  Leave(UserId),
  Add {
    user: UserId,
    url: String,
    bump: bool,
  },
  Queue(UserId),
  Play(UserId),
  Pause(UserId),
  Resume(UserId),
  Stop(UserId),
  Skip(UserId),
  Loop(UserId),
  /// `voice <user> <channel|off>`: simulated presence change.
  Voice {
    user: UserId,
    channel: Option<ChannelId>,
  },
  Help,
  Quit,
}

pub const CONSOLE_HELP: &str = "\
<user> join | leave | queue | play | pause | resume | stop | skip | loop
<user> add <url> [bump]
voice <user> <channel|off>
help | quit";

fn parse_id(token: Option<&str>, what: &str) -> Result<u64, String> {
  let token = token.ok_or_else(|| format!("missing {what}"))?;
  token
    .parse()
    .map_err(|_| format!("'{token}' is not a valid {what}"))
}

/// Parses `<user> <verb> [args]`, `voice <user> <channel|off>`, `help` and
/// `quit`.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
  let mut parts = line.split_whitespace();
  let first = parts.next().ok_or("empty command")?;

  match first {
    "help" => return Ok(ConsoleCommand::Help),
    "quit" | "exit" => return Ok(ConsoleCommand::Quit),
    "voice" => {
      let user = UserId(parse_id(parts.next(), "user id")?);
      let channel = match parts.next() {
        Some("off") | Some("none") => None,
        other => Some(ChannelId(parse_id(other, "channel id")?)),
      };
      return Ok(ConsoleCommand::Voice { user, channel });
    }
    _ => {}
  }

  let user = UserId(parse_id(Some(first), "user id")?);
  let verb = parts.next().ok_or("missing command")?;
  let cmd = match verb {
    "join" => ConsoleCommand::Join(user),
    "leave" => ConsoleCommand::Leave(user),
    "queue" | "playlist" => ConsoleCommand::Queue(user),
    "play" => ConsoleCommand::Play(user),
    "pause" => ConsoleCommand::Pause(user),
    "resume" => ConsoleCommand::Resume(user),
    "stop" => ConsoleCommand::Stop(user),
    "skip" => ConsoleCommand::Skip(user),
    "loop" => ConsoleCommand::Loop(user),
    "add" => {
      let url = parts.next().ok_or("missing url")?.to_string();
      let bump = parts.next() == Some("bump");
      ConsoleCommand::Add { user, url, bump }
    }
    other => return Err(format!("unknown command '{other}'")),
  };
  Ok(cmd)
}
