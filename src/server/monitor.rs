//! Timeout Monitor.
//!
//! Neither watcher touches session state directly: the ticker and the owner
//! re-check only post messages, and the actor evaluates the policies when
//! they arrive. Both hold weak mailbox senders so they never keep the actor
//! alive on their own.

use std::time::Duration;

use flume::WeakSender;
use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};
use tracing::trace;

use crate::{
  common::types::SessionId,
  gateway::VoicePlatform,
  player::state::PlaybackState,
  server::{messages::Message, session::Session},
};

/// Posts a `Tick` every `every` until the actor goes away.
pub fn spawn_ticker(mailbox: WeakSender<Message>, every: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      interval.tick().await;
      let Some(tx) = mailbox.upgrade() else {
        break;
      };
      if tx.send_async(Message::Tick).await.is_err() {
        break;
      }
    }
    trace!("Inactivity ticker stopped");
  })
}

/// Posts an `OwnerAbsenceCheck` for `session` once `grace` has passed.
pub fn schedule_owner_check(mailbox: WeakSender<Message>, session: SessionId, grace: Duration) {
  tokio::spawn(async move {
    tokio::time::sleep(grace).await;
    if let Some(tx) = mailbox.upgrade() {
      let _ = tx.send_async(Message::OwnerAbsenceCheck { session }).await;
    }
  });
}

/// Inactivity policy: nothing downloading, nothing audible, and the last
/// activity at least `threshold` ago.
pub fn inactivity_expired(session: &Session, now: Instant, threshold: Duration) -> bool {
  !session.is_downloading()
    && session.player.state() != PlaybackState::Playing
    && now.saturating_duration_since(session.last_activity) >= threshold
}

pub fn owner_present(platform: &dyn VoicePlatform, session: &Session) -> bool {
  platform.members_of(session.channel()).contains(&session.owner)
}
