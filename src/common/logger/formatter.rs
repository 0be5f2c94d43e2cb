use core::fmt as core_fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
  fmt::{
    FmtContext, FormattedFields,
    format::{FormatEvent, FormatFields, Writer},
  },
  registry::LookupSpan,
};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";

fn level_colour(level: &Level) -> &'static str {
  match *level {
    Level::ERROR => "\x1b[31m",
    Level::WARN => "\x1b[33m",
    Level::INFO => "\x1b[32m",
    Level::DEBUG => "\x1b[34m",
    Level::TRACE => "\x1b[35m",
  }
}

/// Drops the crate prefix: `jukebox::server::monitor` -> `server::monitor`.
pub fn short_target(target: &str) -> &str {
  target
    .strip_prefix("jukebox::")
    .filter(|rest| !rest.is_empty())
    .unwrap_or(target)
}

/// `[12:00:00.000] INFO  main server::session_manager:42 decoder{file=x}> msg`
pub struct CustomFormatter {
  use_ansi: bool,
}

impl CustomFormatter {
  pub fn new(use_ansi: bool) -> Self {
    Self { use_ansi }
  }

  fn paint<'a>(&self, code: &'a str) -> &'a str {
    if self.use_ansi { code } else { "" }
  }
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
  S: Subscriber + for<'a> LookupSpan<'a>,
  N: for<'a> FormatFields<'a> + 'static,
{
  fn format_event(
    &self,
    ctx: &FmtContext<'_, S, N>,
    mut writer: Writer<'_>,
    event: &Event<'_>,
  ) -> core_fmt::Result {
    let (reset, dim) = (self.paint(RESET), self.paint(DIM));

    let format = time::macros::format_description!(
      "[hour]:[minute]:[second].[subsecond digits:3]"
    );
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let timestamp = now.format(&format).unwrap_or_else(|_| "--:--:--.---".into());
    write!(writer, "{dim}[{timestamp}]{reset} ")?;

    let metadata = event.metadata();
    let level = metadata.level();
    write!(
      writer,
      "{}{}{:<5}{} ",
      self.paint(level_colour(level)),
      self.paint(BOLD),
      level.as_str(),
      reset
    )?;

    let thread = std::thread::current();
    match thread.name() {
      Some(name) => write!(writer, "{name} ")?,
      None => write!(writer, "{:?} ", thread.id())?,
    }

    write!(writer, "{dim}{}", short_target(metadata.target()))?;
    if let Some(line) = metadata.line() {
      write!(writer, ":{line}")?;
    }
    write!(writer, "{reset} ")?;

    if let Some(scope) = ctx.event_scope() {
      for span in scope.from_root() {
        write!(writer, "{}", span.name())?;
        let ext = span.extensions();
        if let Some(fields) = ext.get::<FormattedFields<N>>() {
          if !fields.is_empty() {
            write!(writer, "{{{fields}}}")?;
          }
        }
        write!(writer, " ")?;
      }
    }

    write!(writer, "> ")?;
    ctx.format_fields(writer.by_ref(), event)?;
    write!(writer, "{reset}")?;
    writeln!(writer)
  }
}
