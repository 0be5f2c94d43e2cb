use crate::configs::PlayerConfig;

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Build facts captured by `build.rs`.
pub struct BannerInfo {
  pub version: &'static str,
  /// Unix seconds.
  pub build_time: &'static str,
  pub branch: &'static str,
  pub commit_short: &'static str,
  pub dirty: bool,
  pub profile: &'static str,
}

impl Default for BannerInfo {
  fn default() -> Self {
    Self {
      version: env!("CARGO_PKG_VERSION"),
      build_time: option_env!("BUILD_TIME").unwrap_or("unknown"),
      branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
      commit_short: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
      dirty: option_env!("GIT_DIRTY") == Some("true"),
      profile: if cfg!(debug_assertions) {
        "debug"
      } else {
        "release"
      },
    }
  }
}

impl BannerInfo {
  /// `build_time` as a UTC date, or the raw value when it is not a timestamp.
  pub fn build_date(&self) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    self
      .build_time
      .parse::<i64>()
      .ok()
      .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs).ok())
      .and_then(|at| at.format(&format).ok())
      .unwrap_or_else(|| self.build_time.to_string())
  }

  fn commit(&self) -> String {
    if self.dirty {
      format!("{}{YELLOW} (dirty){RESET}", self.commit_short)
    } else {
      self.commit_short.to_string()
    }
  }
}

pub fn print_banner(info: &BannerInfo, player: &PlayerConfig) {
  crate::log_println!();
  crate::log_println!("{GREEN}       _       _        _               {RESET}");
  crate::log_println!("{GREEN}      (_)_   _| | _____| |__   _____  __{RESET}");
  crate::log_println!("{GREEN}      | | | | | |/ / _ \\ '_ \\ / _ \\ \\/ /{RESET}");
  crate::log_println!("{GREEN}      | | |_| |   <  __/ |_) | (_) >  < {RESET}");
  crate::log_println!("{GREEN}     _/ |\\__,_|_|\\_\\___|_.__/ \\___/_/\\_\\{RESET}");
  crate::log_println!("{GREEN}    |__/                                {RESET}");
  crate::log_println!("{DIM}========================================{RESET}");
  crate::log_println!();

  let rows = [
    ("Version", info.version.to_string(), CYAN),
    ("Built", info.build_date(), RESET),
    ("Branch", info.branch.to_string(), RESET),
    ("Commit", info.commit(), RESET),
    ("Profile", info.profile.to_string(), YELLOW),
    ("Queue limit", player.queue_limit.to_string(), RESET),
    (
      "Timeouts",
      format!(
        "{}s idle / {}s ownerless",
        player.inactivity_timeout_secs, player.ownerless_timeout_secs
      ),
      RESET,
    ),
  ];
  for (label, value, colour) in rows {
    crate::log_println!("  {BOLD}{label:<14}{RESET}{colour}{value}{RESET}");
  }
  crate::log_println!();
}
