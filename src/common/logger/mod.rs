use std::{fs, io::Write, path::Path, sync::OnceLock};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::*;
pub use writer::*;

use crate::configs::{Config, LogFileConfig};

/// Set once by [`init`] when a log file is configured.
pub(crate) static GLOBAL_FILE_WRITER: OnceLock<CircularFileWriter> = OnceLock::new();

/// `println!` that also lands in the log file, without colour codes.
#[macro_export]
macro_rules! log_println {
  () => {{
    std::println!();
    $crate::common::logger::append_to_file_raw("\n");
  }};
  ($($arg:tt)*) => {{
    let msg = format!($($arg)*);
    std::println!("{}", msg);
    $crate::common::logger::append_to_file_raw(&format!("{}\n", msg));
  }};
}

pub fn append_to_file_raw(msg: &str) {
  if let Some(mut writer) = GLOBAL_FILE_WRITER.get().cloned() {
    let _ = writer.write_all(strip_ansi_escapes(msg).as_bytes());
  }
}

/// Builds the `EnvFilter` directive string from the logging section.
/// Symphonia's probe chatter is capped at `warn`.
pub fn filter_directives(config: &Config) -> String {
  let logging = config.logging.as_ref();
  let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");

  let mut directives = vec![level, "symphonia=warn"];
  directives.extend(
    logging
      .and_then(|l| l.filters.as_deref())
      .map(str::trim)
      .filter(|f| !f.is_empty()),
  );
  directives.join(",")
}

/// Creates the log directory and the bounded writer for `file`.
fn file_writer(file: &LogFileConfig) -> CircularFileWriter {
  if let Some(parent) = Path::new(&file.path).parent() {
    if let Err(e) = fs::create_dir_all(parent) {
      eprintln!("Failed to create log directory {}: {}", parent.display(), e);
    }
  }
  CircularFileWriter::new(file.path.clone(), file.max_lines)
}

/// Installs the global subscriber: coloured stdout plus an optional plain
/// file. `RUST_LOG` wins over the config when set.
pub fn init(config: &Config) {
  let env_filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

  let stdout_layer = fmt::layer()
    .event_format(CustomFormatter::new(true))
    .with_ansi(true);

  let file_layer = config
    .logging
    .as_ref()
    .and_then(|logging| logging.file.as_ref())
    .map(|file| {
      let writer = file_writer(file);
      let _ = GLOBAL_FILE_WRITER.set(writer.clone());
      fmt::layer()
        .with_writer(writer)
        .event_format(CustomFormatter::new(false))
        .with_ansi(false)
    });

  tracing_subscriber::registry()
    .with(env_filter)
    .with(stdout_layer)
    .with(file_layer)
    .init();
}
