use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Session limits and timeout policies.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
  /// Queued plus in-flight tracks allowed at once.
  #[serde(default = "default_queue_limit")]
  pub queue_limit: usize,
  /// Grace period after the owner leaves the channel.
  #[serde(default = "default_ownerless_timeout_secs")]
  pub ownerless_timeout_secs: u64,
  /// Idle time (not playing, not downloading) before the bot leaves.
  #[serde(default = "default_inactivity_timeout_secs")]
  pub inactivity_timeout_secs: u64,
  #[serde(default = "default_check_interval_secs")]
  pub check_interval_secs: u64,
  /// Where downloaded audio lives until it is played.
  #[serde(default = "default_temp_dir")]
  pub temp_dir: PathBuf,
}

impl PlayerConfig {
  pub fn ownerless_timeout(&self) -> Duration {
    Duration::from_secs(self.ownerless_timeout_secs)
  }

  pub fn inactivity_timeout(&self) -> Duration {
    Duration::from_secs(self.inactivity_timeout_secs)
  }

  pub fn check_interval(&self) -> Duration {
    Duration::from_secs(self.check_interval_secs.max(1))
  }
}

impl Default for PlayerConfig {
  fn default() -> Self {
    Self {
      queue_limit: default_queue_limit(),
      ownerless_timeout_secs: default_ownerless_timeout_secs(),
      inactivity_timeout_secs: default_inactivity_timeout_secs(),
      check_interval_secs: default_check_interval_secs(),
      temp_dir: default_temp_dir(),
    }
  }
}

fn default_queue_limit() -> usize {
  10
}

fn default_ownerless_timeout_secs() -> u64 {
  60
}

fn default_inactivity_timeout_secs() -> u64 {
  300
}

fn default_check_interval_secs() -> u64 {
  5
}

fn default_temp_dir() -> PathBuf {
  PathBuf::from("./local_storage/temp_music")
}
