//! Session Lifecycle.
//!
//! [`SessionManager`] is an actor: it owns the `Option<Session>` and handles
//! one mailbox message at a time. [`Jukebox`] is the cloneable handle the
//! front-end talks to.

use std::sync::Arc;

use flume::{Receiver, WeakSender};
use tokio::{
  sync::oneshot,
  task::JoinHandle,
  time::Instant,
};
use tracing::{debug, info, trace, warn};

use crate::{
  common::{
    JukeboxError,
    types::{AnyResult, SessionId, UserId},
  },
  configs::PlayerConfig,
  gateway::VoicePlatform,
  player::{
    engine::{EndOutcome, PlayOutcome, TrackEnd, TrackEndNotifier},
    state::{Track, TrackInfo},
    store::{discard_file, purge_dir},
  },
  server::{
    download::{DownloadJob, spawn_download},
    messages::{Command, JoinOutcome, Message, QueueSnapshot, Reply},
    monitor,
    session::Session,
  },
  sources::SourceManager,
};

/// Handle to the running session actor.
#[derive(Clone)]
pub struct Jukebox {
  mailbox: flume::Sender<Message>,
}

impl Jukebox {
  /// Clears `temp_dir` and spawns the session actor on the current runtime.
  pub fn start(
    config: PlayerConfig,
    platform: Arc<dyn VoicePlatform>,
    sources: Arc<SourceManager>,
  ) -> AnyResult<Self> {
    let purged = purge_dir(&config.temp_dir)?;
    if purged > 0 {
      info!(
        "Removed {} leftover track files from {}",
        purged,
        config.temp_dir.display()
      );
    }

    let (tx, rx) = flume::unbounded();
    let manager = SessionManager {
      config,
      platform,
      sources,
      mailbox: tx.downgrade(),
      session: None,
      ticker: None,
    };
    tokio::spawn(manager.run(rx));

    Ok(Self { mailbox: tx })
  }

  async fn request<T>(
    &self,
    build: impl FnOnce(Reply<T>) -> Command,
  ) -> Result<T, JukeboxError> {
    let (tx, rx) = oneshot::channel();
    self
      .mailbox
      .send_async(Message::Command(build(tx)))
      .await
      .map_err(|_| JukeboxError::Closed)?;
    rx.await.map_err(|_| JukeboxError::Closed)?
  }

  pub async fn join(&self, caller: UserId) -> Result<JoinOutcome, JukeboxError> {
    self.request(|reply| Command::Join { caller, reply }).await
  }

  pub async fn leave(&self, caller: UserId) -> Result<(), JukeboxError> {
    self.request(|reply| Command::Leave { caller, reply }).await
  }

  /// Resolves for as long as the download takes.
  pub async fn add_track(
    &self,
    caller: UserId,
    url: impl Into<String>,
    bump: bool,
  ) -> Result<TrackInfo, JukeboxError> {
    let url = url.into();
    self
      .request(|reply| Command::AddTrack {
        caller,
        url,
        bump,
        reply,
      })
      .await
  }

  pub async fn show_queue(&self, caller: UserId) -> Result<QueueSnapshot, JukeboxError> {
    self.request(|reply| Command::ShowQueue { caller, reply }).await
  }

  pub async fn play(&self, caller: UserId) -> Result<PlayOutcome, JukeboxError> {
    self.request(|reply| Command::Play { caller, reply }).await
  }

  pub async fn pause(&self, caller: UserId) -> Result<(), JukeboxError> {
    self.request(|reply| Command::Pause { caller, reply }).await
  }

  pub async fn resume(&self, caller: UserId) -> Result<(), JukeboxError> {
    self.request(|reply| Command::Resume { caller, reply }).await
  }

  pub async fn stop(&self, caller: UserId) -> Result<(), JukeboxError> {
    self.request(|reply| Command::Stop { caller, reply }).await
  }

  pub async fn skip(&self, caller: UserId) -> Result<Option<TrackInfo>, JukeboxError> {
    self.request(|reply| Command::Skip { caller, reply }).await
  }

  pub async fn toggle_loop(&self, caller: UserId) -> Result<bool, JukeboxError> {
    self.request(|reply| Command::ToggleLoop { caller, reply }).await
  }

  /// Presence-change notification from the platform. Fire and forget.
  pub fn voice_state_update(&self, user: UserId) {
    let _ = self
      .mailbox
      .send(Message::Command(Command::VoiceStateUpdate { user }));
  }

  /// Tears the session down, if any. Used on reload and exit.
  pub async fn shutdown(&self) {
    let (tx, rx) = oneshot::channel();
    if self
      .mailbox
      .send_async(Message::Command(Command::Shutdown { reply: tx }))
      .await
      .is_ok()
    {
      let _ = rx.await;
    }
  }
}

struct SessionManager {
  config: PlayerConfig,
  platform: Arc<dyn VoicePlatform>,
  sources: Arc<SourceManager>,
  mailbox: WeakSender<Message>,
  session: Option<Session>,
  ticker: Option<JoinHandle<()>>,
}

impl SessionManager {
  async fn run(mut self, rx: Receiver<Message>) {
    info!("Session manager started");
    while let Ok(msg) = rx.recv_async().await {
      self.handle(msg).await;
    }

    self.teardown("service stopped").await;
    if let Some(ticker) = self.ticker.take() {
      ticker.abort();
    }
    info!("Session manager stopped");
  }

  async fn handle(&mut self, msg: Message) {
    match msg {
      Message::Command(cmd) => self.on_command(cmd).await,
      Message::TrackEnded { session, end } => self.on_track_ended(session, end),
      Message::DownloadFinished {
        session,
        job,
        bump,
        result,
        reply,
      } => {
        let outcome = self.on_download_finished(session, job, bump, result);
        let _ = reply.send(outcome);
      }
      Message::Tick => self.on_tick().await,
      Message::OwnerAbsenceCheck { session } => self.on_owner_check(session).await,
    }
  }

  async fn on_command(&mut self, cmd: Command) {
    match cmd {
      Command::Join { caller, reply } => {
        let _ = reply.send(self.join(caller).await);
      }
      Command::Leave { caller, reply } => {
        let _ = reply.send(self.leave(caller).await);
      }
      Command::AddTrack {
        caller,
        url,
        bump,
        reply,
      } => self.add_track(caller, url, bump, reply),
      Command::ShowQueue { caller, reply } => {
        let _ = reply.send(self.show_queue(caller));
      }
      Command::Play { caller, reply } => {
        let result = self.owned(caller).and_then(|s| s.player.play(&mut s.store));
        let _ = reply.send(result);
      }
      Command::Pause { caller, reply } => {
        let _ = reply.send(self.owned(caller).and_then(|s| s.player.pause()));
      }
      Command::Resume { caller, reply } => {
        let _ = reply.send(self.owned(caller).and_then(|s| s.player.resume()));
      }
      Command::Stop { caller, reply } => {
        let _ = reply.send(self.owned(caller).and_then(|s| s.player.stop()));
      }
      Command::Skip { caller, reply } => {
        let result = self.owned(caller).map(|s| s.player.skip(&mut s.store));
        let _ = reply.send(result);
      }
      Command::ToggleLoop { caller, reply } => {
        let _ = reply.send(self.owned(caller).map(|s| s.player.toggle_loop()));
      }
      Command::VoiceStateUpdate { user } => self.on_voice_state_update(user),
      Command::Shutdown { reply } => {
        self.teardown("shutdown requested").await;
        let _ = reply.send(());
      }
    }
  }

  /// Existence and ownership check shared by every mutating command.
  /// Stamps activity on success.
  fn owned(&mut self, caller: UserId) -> Result<&mut Session, JukeboxError> {
    let session = self.session.as_mut().ok_or(JukeboxError::NoSession)?;
    session.require_owner(caller)?;
    session.touch();
    Ok(session)
  }

  async fn join(&mut self, caller: UserId) -> Result<JoinOutcome, JukeboxError> {
    let channel = self
      .platform
      .voice_channel_of(caller)
      .ok_or(JukeboxError::NoVoiceContext)?;

    if let Some(session) = self.session.as_mut() {
      if session.owner != caller {
        return Err(JukeboxError::SessionBusy {
          owner: session.owner,
        });
      }
      session.touch();
      if session.channel() == channel {
        return Ok(JoinOutcome::AlreadyConnected(channel));
      }

      self
        .platform
        .move_to(&mut session.voice, channel)
        .await
        .map_err(|e| JukeboxError::Voice(e.to_string()))?;
      info!("Session {} moved to channel {}", session.id, channel);
      return Ok(JoinOutcome::Moved(channel));
    }

    let voice = self
      .platform
      .connect(channel)
      .await
      .map_err(|e| JukeboxError::Voice(e.to_string()))?;

    let id = SessionId::generate();
    info!("Session {} created by {} in channel {}", id, caller, channel);
    let notifier = self.notifier(id.clone());
    self.session = Some(Session::new(
      id,
      caller,
      voice,
      self.config.queue_limit,
      notifier,
    ));
    self.ensure_ticker();

    Ok(JoinOutcome::Created(channel))
  }

  async fn leave(&mut self, caller: UserId) -> Result<(), JukeboxError> {
    self
      .session
      .as_ref()
      .ok_or(JukeboxError::NoSession)?
      .require_owner(caller)?;
    self.teardown("owner asked to leave").await;
    Ok(())
  }

  fn show_queue(&mut self, caller: UserId) -> Result<QueueSnapshot, JukeboxError> {
    let session = self.session.as_mut().ok_or(JukeboxError::NoSession)?;
    if session.owner == caller {
      session.touch();
    }
    Ok(session.snapshot())
  }

  fn add_track(&mut self, caller: UserId, url: String, bump: bool, reply: Reply<TrackInfo>) {
    let (session, job) = match self.admit(caller, &url) {
      Ok(admitted) => admitted,
      Err(e) => {
        debug!("Rejected add of {}: {}", url, e);
        let _ = reply.send(Err(e));
        return;
      }
    };

    let Some(mailbox) = self.mailbox.upgrade() else {
      if let Some(s) = self.session.as_mut() {
        s.store.release(job);
      }
      let _ = reply.send(Err(JukeboxError::Closed));
      return;
    };

    spawn_download(
      self.sources.clone(),
      mailbox,
      DownloadJob {
        session,
        job,
        url,
        bump,
        dir: self.config.temp_dir.clone(),
        reply,
      },
    );
  }

  /// Runs the add checks in order and takes a queue slot.
  fn admit(&mut self, caller: UserId, url: &str) -> Result<(SessionId, u64), JukeboxError> {
    let sources = self.sources.clone();
    let session = self.owned(caller)?;

    session.store.check_admission(url)?;
    if session
      .player
      .current()
      .is_some_and(|t| t.source_url == url)
    {
      return Err(JukeboxError::DuplicateTrack);
    }
    sources.check_supported(url)?;

    let job = session.store.reserve(url)?;
    Ok((session.id.clone(), job))
  }

  fn on_download_finished(
    &mut self,
    session_id: SessionId,
    job: u64,
    bump: bool,
    result: Result<Track, String>,
  ) -> Result<TrackInfo, JukeboxError> {
    let session = match self.session.as_mut() {
      Some(s) if s.id == session_id => s,
      _ => {
        debug!("Discarding download job {} of closed session {}", job, session_id);
        if let Ok(track) = &result {
          discard_file(&track.local_path);
        }
        return Err(JukeboxError::NoSession);
      }
    };

    session.store.release(job);
    let track = result.map_err(JukeboxError::DownloadFailed)?;

    let clashes_current = session
      .player
      .current()
      .is_some_and(|c| c.info == track.info || c.source_url == track.source_url);
    let info = track.info.clone();
    let path = track.local_path.clone();

    let inserted = if clashes_current {
      Err(JukeboxError::DuplicateTrack)
    } else {
      session.store.insert(track, bump)
    };
    match inserted {
      Ok(()) => {
        session.touch();
        info!("Added {} to the playlist", info);
        Ok(info)
      }
      Err(e) => {
        discard_file(&path);
        Err(e)
      }
    }
  }

  fn on_track_ended(&mut self, session_id: SessionId, end: TrackEnd) {
    let Some(session) = self.session.as_mut().filter(|s| s.id == session_id) else {
      trace!("Dropping track end of closed session {}", session_id);
      return;
    };

    match session.player.on_track_end(end, &mut session.store) {
      EndOutcome::Stale => {}
      EndOutcome::Replayed(info) | EndOutcome::Advanced(info) => {
        session.touch();
        debug!("Now playing {}", info);
      }
      EndOutcome::Idle => {
        session.touch();
        debug!("Playlist finished");
      }
    }
  }

  async fn on_tick(&mut self) {
    let threshold = self.config.inactivity_timeout();
    let expired = self
      .session
      .as_ref()
      .is_some_and(|s| monitor::inactivity_expired(s, Instant::now(), threshold));
    if expired {
      self.teardown("inactivity").await;
    }
  }

  fn on_voice_state_update(&mut self, user: UserId) {
    let Some(session) = self.session.as_ref() else {
      return;
    };
    if user != session.owner || monitor::owner_present(self.platform.as_ref(), session) {
      return;
    }

    let grace = self.config.ownerless_timeout();
    info!(
      "Owner {} left channel {}; leaving in {:?} unless they return",
      user,
      session.channel(),
      grace
    );
    monitor::schedule_owner_check(self.mailbox.clone(), session.id.clone(), grace);
  }

  async fn on_owner_check(&mut self, session_id: SessionId) {
    let absent = self
      .session
      .as_ref()
      .filter(|s| s.id == session_id)
      .is_some_and(|s| !monitor::owner_present(self.platform.as_ref(), s));
    if absent {
      self.teardown("owner absent").await;
    }
  }

  /// Single teardown path. A no-op when there is no session.
  async fn teardown(&mut self, reason: &str) {
    let Some(session) = self.session.take() else {
      return;
    };
    info!("Leaving voice channel {} ({})", session.channel(), reason);

    let voice = session.dismantle();
    if let Err(e) = self.platform.disconnect(voice).await {
      warn!("Failed to disconnect from voice: {}", e);
    }
  }

  fn ensure_ticker(&mut self) {
    if self.ticker.as_ref().is_some_and(|t| !t.is_finished()) {
      return;
    }
    self.ticker = Some(monitor::spawn_ticker(
      self.mailbox.clone(),
      self.config.check_interval(),
    ));
  }

  fn notifier(&self, session: SessionId) -> TrackEndNotifier {
    let mailbox = self.mailbox.clone();
    Arc::new(move |end| {
      if let Some(tx) = mailbox.upgrade() {
        let _ = tx.send(Message::TrackEnded {
          session: session.clone(),
          end,
        });
      }
    })
  }
}
