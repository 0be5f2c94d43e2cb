use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
  /// URL hosts accepted by add-song, compared case-insensitively.
  #[serde(default = "default_allowed_hosts")]
  pub allowed_hosts: Vec<String>,
  #[serde(default = "default_ytdlp_path")]
  pub ytdlp_path: String,
}

impl Default for SourcesConfig {
  fn default() -> Self {
    Self {
      allowed_hosts: default_allowed_hosts(),
      ytdlp_path: default_ytdlp_path(),
    }
  }
}

fn default_allowed_hosts() -> Vec<String> {
  vec!["www.youtube.com".to_string(), "youtu.be".to_string()]
}

fn default_ytdlp_path() -> String {
  "yt-dlp".to_string()
}
