use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use regex::Regex;
use tracing::{debug, info, trace, warn};

use super::{
  plugin::{BoxedResolver, ResolvedTrack},
  ytdlp::YtDlpResolver,
};
use crate::{
  common::{JukeboxError, types::AnyResult},
  configs::SourcesConfig,
  player::{
    state::{Track, TrackInfo},
    store::discard_file,
  },
};

/// Source Manager: host allow-list plus the registered resolvers.
pub struct SourceManager {
  resolvers: Vec<BoxedResolver>,
  allowed_hosts: Vec<String>,
  host_regex: Regex,
  unsafe_chars: Regex,
}

impl SourceManager {
  /// Create a SourceManager backed by the yt-dlp executable.
  pub fn new(config: &SourcesConfig) -> Self {
    let ytdlp: BoxedResolver = Arc::new(YtDlpResolver::new(config.ytdlp_path.clone()));
    info!("Loaded source: yt-dlp ({})", config.ytdlp_path);
    Self::with_resolvers(&config.allowed_hosts, vec![ytdlp])
  }

  pub fn with_resolvers(allowed_hosts: &[String], resolvers: Vec<BoxedResolver>) -> Self {
    Self {
      resolvers,
      allowed_hosts: allowed_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
      host_regex: Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:[^/?#@]*@)?([^/?#:]+)")
        .expect("static host regex"),
      unsafe_chars: Regex::new(r"[^A-Za-z0-9_\-]").expect("static sanitize regex"),
    }
  }

  /// Lower-cased host of `url`, without port or credentials.
  pub fn host_of(&self, url: &str) -> Option<String> {
    self
      .host_regex
      .captures(url.trim())
      .and_then(|c| c.get(1))
      .map(|m| m.as_str().to_ascii_lowercase())
  }

  /// Rejects URLs whose host is not allowed or that no resolver accepts.
  pub fn check_supported(&self, url: &str) -> Result<(), JukeboxError> {
    let host = self
      .host_of(url)
      .ok_or_else(|| JukeboxError::UnsupportedSource {
        host: url.to_string(),
      })?;

    if !self.allowed_hosts.iter().any(|h| *h == host) || self.resolver_for(url).is_none() {
      debug!("Rejected '{}' (host {})", url, host);
      return Err(JukeboxError::UnsupportedSource { host });
    }
    Ok(())
  }

  fn resolver_for(&self, url: &str) -> Option<&BoxedResolver> {
    self.resolvers.iter().find(|r| r.can_handle(url))
  }

  /// File name used for a download: sanitised id plus the job number, so two
  /// jobs never write to the same path.
  pub fn file_name(&self, identifier: &str, job: u64) -> String {
    let stem = self.unsafe_chars.replace_all(identifier, "_");
    let stem = if stem.is_empty() { "track".into() } else { stem };
    format!("{}-{}.mp3", stem, job)
  }

  /// Resolves and downloads `url` into `dir`. Blocking.
  ///
  /// On any failure nothing is left behind in `dir`.
  pub fn download(&self, url: &str, dir: &Path, job: u64) -> AnyResult<Track> {
    let resolver = self
      .resolver_for(url)
      .ok_or_else(|| format!("no source can handle {}", url))?;

    trace!("Resolving '{}' with source: {}", url, resolver.name());
    let ResolvedTrack {
      title,
      author,
      identifier,
      length_ms,
    } = resolver.resolve(url)?;

    let dest: PathBuf = dir.join(self.file_name(&identifier, job));
    if let Err(e) = resolver.fetch(url, &dest) {
      discard_leftovers(&dest);
      return Err(e);
    }
    if !dest.is_file() {
      discard_leftovers(&dest);
      return Err(format!("{} reported success but wrote no file", resolver.name()).into());
    }

    debug!("Downloaded '{}' to {}", title, dest.display());
    Ok(Track {
      info: TrackInfo { title, author },
      identifier,
      local_path: dest,
      source_url: url.to_string(),
      length_ms,
    })
  }
}

/// Deletes `dest` and every sibling sharing its stem, such as the `.webm`
/// and `.part` intermediates of an interrupted fetch.
fn discard_leftovers(dest: &Path) {
  let (Some(dir), Some(stem)) = (dest.parent(), dest.file_stem().and_then(|s| s.to_str())) else {
    discard_file(dest);
    return;
  };
  let prefix = format!("{stem}.");

  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) => {
      warn!("Failed to scan {} for leftovers: {}", dir.display(), e);
      return;
    }
  };
  for path in entries.flatten().map(|entry| entry.path()) {
    let ours = path
      .file_name()
      .and_then(|name| name.to_str())
      .is_some_and(|name| name.starts_with(&prefix));
    if ours && path.is_file() {
      discard_file(&path);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{sources::MediaResolver, testing::MockResolver};

  fn manager(resolver: Arc<MockResolver>) -> SourceManager {
    SourceManager::with_resolvers(
      &["www.youtube.com".to_string(), "youtu.be".to_string()],
      vec![resolver as BoxedResolver],
    )
  }

  #[test]
  fn test_host_extraction() {
    let m = manager(MockResolver::new());
    assert_eq!(
      m.host_of("https://www.YouTube.com/watch?v=abc").as_deref(),
      Some("www.youtube.com")
    );
    assert_eq!(m.host_of("https://youtu.be:443/abc").as_deref(), Some("youtu.be"));
    assert_eq!(
      m.host_of("https://user:pw@youtu.be/abc").as_deref(),
      Some("youtu.be")
    );
    assert_eq!(m.host_of("youtu.be/abc"), None);
  }

  #[test]
  fn test_allowed_hosts() {
    let m = manager(MockResolver::new());
    assert!(m.check_supported("https://www.youtube.com/watch?v=abc").is_ok());
    assert!(m.check_supported("https://youtu.be/abc").is_ok());
    assert_eq!(
      m.check_supported("https://youtube.com/watch?v=abc"),
      Err(JukeboxError::UnsupportedSource {
        host: "youtube.com".into()
      })
    );
    assert!(matches!(
      m.check_supported("not a url"),
      Err(JukeboxError::UnsupportedSource { .. })
    ));
    // Allowed host, but the only resolver refuses plain http.
    assert!(m.check_supported("http://youtu.be/abc").is_err());
  }

  #[test]
  fn test_file_name_is_sanitised() {
    let m = manager(MockResolver::new());
    assert_eq!(m.file_name("dQw4w9WgXcQ", 3), "dQw4w9WgXcQ-3.mp3");
    assert_eq!(m.file_name("../etc/passwd", 1), "___etc_passwd-1.mp3");
    assert_eq!(m.file_name("", 2), "track-2.mp3");
  }

  #[test]
  fn test_download_builds_track() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = MockResolver::new();
    let m = manager(resolver.clone());

    let track = m.download("https://youtu.be/abc", dir.path(), 7).unwrap();
    assert_eq!(track.info, TrackInfo::new("Song abc", "Mock Artist"));
    assert_eq!(track.identifier, "abc");
    assert_eq!(track.local_path, dir.path().join("abc-7.mp3"));
    assert!(track.local_path.is_file());
    assert_eq!(track.source_url, "https://youtu.be/abc");
    assert_eq!(resolver.fetches(), 1);
  }

  #[test]
  fn test_download_failure_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = MockResolver::new();
    resolver.fail("https://youtu.be/gone");
    let m = manager(resolver.clone());

    assert!(m.download("https://youtu.be/gone", dir.path(), 1).is_err());
    assert_eq!(resolver.fetches(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  struct NoFileResolver;

  impl MediaResolver for NoFileResolver {
    fn name(&self) -> &str {
      "nofile"
    }
    fn can_handle(&self, _url: &str) -> bool {
      true
    }
    fn resolve(&self, _url: &str) -> AnyResult<ResolvedTrack> {
      Ok(ResolvedTrack {
        title: "t".into(),
        author: "a".into(),
        identifier: "x".into(),
        length_ms: None,
      })
    }
    fn fetch(&self, _url: &str, _dest: &Path) -> AnyResult<()> {
      Ok(())
    }
  }

  /// Leaves yt-dlp style intermediates behind and then fails.
  struct InterruptedResolver;

  impl MediaResolver for InterruptedResolver {
    fn name(&self) -> &str {
      "interrupted"
    }
    fn can_handle(&self, _url: &str) -> bool {
      true
    }
    fn resolve(&self, _url: &str) -> AnyResult<ResolvedTrack> {
      Ok(ResolvedTrack {
        title: "t".into(),
        author: "a".into(),
        identifier: "x".into(),
        length_ms: None,
      })
    }
    fn fetch(&self, _url: &str, dest: &Path) -> AnyResult<()> {
      std::fs::write(dest.with_extension("webm.part"), b"half")?;
      std::fs::write(dest.with_extension("webm"), b"whole")?;
      Err("ffmpeg exited with status 1".into())
    }
  }

  #[test]
  fn test_interrupted_fetch_removes_intermediates() {
    let dir = tempfile::tempdir().unwrap();
    // Another job's file with a similar name must survive.
    std::fs::write(dir.path().join("x-12.mp3"), b"keep").unwrap();

    let resolver: BoxedResolver = Arc::new(InterruptedResolver);
    let m = SourceManager::with_resolvers(&["youtu.be".into()], vec![resolver]);
    assert!(m.download("https://youtu.be/x", dir.path(), 1).is_err());

    let left: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().file_name().into_string().unwrap())
      .collect();
    assert_eq!(left, vec!["x-12.mp3".to_string()]);
  }

  #[test]
  fn test_fetch_without_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let resolver: BoxedResolver = Arc::new(NoFileResolver);
    let m = SourceManager::with_resolvers(&["youtu.be".into()], vec![resolver]);
    assert!(m.download("https://youtu.be/x", dir.path(), 1).is_err());
  }
}
