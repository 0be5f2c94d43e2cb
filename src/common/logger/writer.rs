use std::{
  collections::VecDeque,
  fs::{self, File, OpenOptions},
  io::{self, BufRead, BufReader, Write},
  path::PathBuf,
  sync::{Arc, LazyLock},
};

use parking_lot::Mutex;
use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("static ansi regex"));

/// Removes ANSI colour sequences so the log file stays plain text.
pub fn strip_ansi_escapes(s: &str) -> String {
  ANSI_ESCAPE.replace_all(s, "").into_owned()
}

struct WriterState {
  file: Option<File>,
  lines_since_prune: u32,
}

/// Line-bounded log file. Appends through one shared handle and, every
/// `max_lines / 10` lines (at least 50), cuts the file back to its newest
/// `max_lines` lines.
#[derive(Clone)]
pub struct CircularFileWriter {
  path: PathBuf,
  max_lines: u32,
  state: Arc<Mutex<WriterState>>,
}

impl CircularFileWriter {
  pub fn new(path: impl Into<PathBuf>, max_lines: u32) -> Self {
    Self {
      path: path.into(),
      max_lines: max_lines.max(1),
      state: Arc::new(Mutex::new(WriterState {
        file: None,
        lines_since_prune: 0,
      })),
    }
  }

  fn open(&self) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(&self.path)
  }

  /// Keeps the newest `max_lines` lines, swapping the file in via rename.
  fn prune(&self) -> io::Result<()> {
    let keep = self.max_lines as usize;
    let mut tail: VecDeque<String> = VecDeque::with_capacity(keep + 1);
    let mut total = 0usize;

    for line in BufReader::new(File::open(&self.path)?).lines() {
      tail.push_back(line?);
      total += 1;
      if tail.len() > keep {
        tail.pop_front();
      }
    }
    if total <= keep {
      return Ok(());
    }

    let scratch = self.path.with_extension("prune");
    {
      let mut out = io::BufWriter::new(File::create(&scratch)?);
      for line in &tail {
        writeln!(out, "{line}")?;
      }
      out.flush()?;
    }
    fs::rename(&scratch, &self.path)
  }

  fn prune_threshold(&self) -> u32 {
    (self.max_lines / 10).max(50)
  }
}

impl io::Write for CircularFileWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let mut state = self.state.lock();
    if state.file.is_none() {
      state.file = Some(self.open()?);
    }
    if let Some(file) = state.file.as_mut() {
      file.write_all(buf)?;
    }

    state.lines_since_prune += buf.iter().filter(|&&b| b == b'\n').count() as u32;
    if state.lines_since_prune >= self.prune_threshold() {
      state.lines_since_prune = 0;
      // The old handle points at the replaced inode after a prune.
      state.file = None;
      if let Err(e) = self.prune() {
        eprintln!("Failed to prune {}: {}", self.path.display(), e);
      }
    }
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    match self.state.lock().file.as_mut() {
      Some(file) => file.flush(),
      None => Ok(()),
    }
  }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CircularFileWriter {
  type Writer = Self;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_strip_ansi() {
    assert_eq!(strip_ansi_escapes("\x1b[32mok\x1b[0m done"), "ok done");
    assert_eq!(strip_ansi_escapes("\x1b[1;31mred\x1b[0m"), "red");
    assert_eq!(strip_ansi_escapes("plain"), "plain");
  }

  #[test]
  fn test_prunes_to_max_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jukebox.log");
    let mut writer = CircularFileWriter::new(&path, 20);

    for i in 0..120 {
      writeln!(writer, "line {i}").unwrap();
    }
    writer.flush().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert!(lines.len() <= 70, "got {} lines", lines.len());
    assert_eq!(lines.last(), Some(&"line 119"));
    assert!(!dir.path().join("jukebox.prune").exists());
  }

  #[test]
  fn test_clones_share_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.log");
    let mut a = CircularFileWriter::new(&path, 1000);
    let mut b = a.clone();

    writeln!(a, "from a").unwrap();
    writeln!(b, "from b").unwrap();
    a.flush().unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "from a\nfrom b\n");
  }
}
