use std::{path::Path, process::Command};

use serde_json::Value;
use tracing::{debug, error};

use crate::{
  common::types::AnyResult,
  sources::plugin::{MediaResolver, ResolvedTrack},
};

/// Resolver backed by the `yt-dlp` executable.
pub struct YtDlpResolver {
  binary: String,
}

impl YtDlpResolver {
  pub fn new(binary: String) -> Self {
    Self { binary }
  }

  fn run(&self, args: &[&str]) -> AnyResult<String> {
    debug!("{} {}", self.binary, args.join(" "));
    let output = Command::new(&self.binary).args(args).output()?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let reason = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string();
      error!("{} exited with {}: {}", self.binary, output.status, reason);
      return Err(reason.into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

/// Pulls title, uploader, id and duration out of `--dump-single-json` output.
pub fn parse_metadata(json: &str) -> AnyResult<ResolvedTrack> {
  let value: Value = serde_json::from_str(json)?;

  let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

  let identifier = field("id").ok_or("yt-dlp metadata has no id")?;
  let title = field("title").unwrap_or_else(|| identifier.clone());
  let author = field("uploader")
    .or_else(|| field("channel"))
    .unwrap_or_else(|| "Unknown Artist".to_string());
  let length_ms = value
    .get("duration")
    .and_then(Value::as_f64)
    .map(|secs| (secs * 1000.0) as u64);

  Ok(ResolvedTrack {
    title,
    author,
    identifier,
    length_ms,
  })
}

impl MediaResolver for YtDlpResolver {
  fn name(&self) -> &str {
    "yt-dlp"
  }

  fn can_handle(&self, url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
  }

  fn resolve(&self, url: &str) -> AnyResult<ResolvedTrack> {
    let json = self.run(&[
      "--no-playlist",
      "--no-warnings",
      "--dump-single-json",
      "--skip-download",
      url,
    ])?;
    parse_metadata(&json)
  }

  fn fetch(&self, url: &str, dest: &Path) -> AnyResult<()> {
    // yt-dlp picks the extension itself; extract-audio then converts to mp3,
    // which lands on `dest`.
    let template = dest.with_extension("%(ext)s");
    let template = template.to_str().ok_or("destination path is not UTF-8")?;
    self.run(&[
      "--no-playlist",
      "--no-warnings",
      "--format",
      "mp3/bestaudio/best",
      "--extract-audio",
      "--audio-format",
      "mp3",
      "--output",
      template,
      url,
    ])?;
    Ok(())
  }
}
