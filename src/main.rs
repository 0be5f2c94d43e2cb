use std::sync::Arc;

use jukebox::{
  common::{
    JukeboxError,
    banner::{BannerInfo, print_banner},
    logger,
    types::AnyResult,
  },
  configs::Config,
  gateway::{CONSOLE_HELP, ConsoleCommand, ConsolePlatform, parse_command},
  log_println,
  player::PlayOutcome,
  server::Jukebox,
  sources::SourceManager,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
  let config = Config::load().unwrap_or_else(|e| {
    log_println!("{}; using built-in defaults", e);
    Config::default()
  });

  logger::init(&config);
  print_banner(&BannerInfo::default(), &config.player);

  let platform = ConsolePlatform::new();
  let sources = Arc::new(SourceManager::new(&config.sources));
  let jukebox = Jukebox::start(config.player.clone(), platform.clone(), sources)?;

  info!(
    "Jukebox ready (queue limit {}, temp dir {})",
    config.player.queue_limit,
    config.player.temp_dir.display()
  );
  log_println!("Type 'help' for commands.");

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    tokio::select! {
      line = lines.next_line() => {
        let Some(line) = line? else { break };
        if !dispatch(&jukebox, &platform, line.trim()).await {
          break;
        }
      }
      _ = tokio::signal::ctrl_c() => {
        info!("Received Ctrl+C, shutting down");
        break;
      }
    }
  }

  jukebox.shutdown().await;
  info!("Jukebox stopped");
  Ok(())
}

fn render<T>(result: Result<T, JukeboxError>, ok: impl FnOnce(T) -> String) -> String {
  match result {
    Ok(value) => ok(value),
    Err(e) => e.to_string(),
  }
}

/// Runs one console line. Returns false when the user asked to quit.
async fn dispatch(jukebox: &Jukebox, platform: &ConsolePlatform, line: &str) -> bool {
  if line.is_empty() {
    return true;
  }

  let cmd = match parse_command(line) {
    Ok(cmd) => cmd,
    Err(e) => {
      log_println!("{}", e);
      return true;
    }
  };

  let reply = match cmd {
    ConsoleCommand::Quit => return false,
    ConsoleCommand::Help => CONSOLE_HELP.to_string(),
    ConsoleCommand::Voice { user, channel } => {
      platform.set_voice_state(user, channel);
      jukebox.voice_state_update(user);
      match channel {
        Some(channel) => format!("{} is now in voice channel {}", user, channel),
        None => format!("{} left voice", user),
      }
    }
    ConsoleCommand::Join(user) => render(jukebox.join(user).await, |o| o.to_string()),
    ConsoleCommand::Leave(user) => render(jukebox.leave(user).await, |_| {
      "Left the voice channel".to_string()
    }),
    ConsoleCommand::Add { user, url, bump } => {
      // Downloads take a while; keep the prompt responsive.
      let jukebox = jukebox.clone();
      tokio::spawn(async move {
        let reply = render(jukebox.add_track(user, url, bump).await, |info| {
          format!("Added to playlist: {}", info)
        });
        log_println!("{}", reply);
      });
      "Downloading...".to_string()
    }
    ConsoleCommand::Queue(user) => render(jukebox.show_queue(user).await, |q| q.to_string()),
    ConsoleCommand::Play(user) => render(jukebox.play(user).await, |o| match o {
      PlayOutcome::Started(info) => format!("Starting audio: {}", info),
      PlayOutcome::Resumed => "Resumed audio".to_string(),
    }),
    ConsoleCommand::Pause(user) => render(jukebox.pause(user).await, |_| "Paused audio".into()),
    ConsoleCommand::Resume(user) => {
      render(jukebox.resume(user).await, |_| "Resumed audio".into())
    }
    ConsoleCommand::Stop(user) => render(jukebox.stop(user).await, |_| "Stopped audio".into()),
    ConsoleCommand::Skip(user) => render(jukebox.skip(user).await, |next| match next {
      Some(info) => format!("Skipped audio.\nNow playing: {}", info),
      None => "Skipped audio.\nNo more audio to play".to_string(),
    }),
    ConsoleCommand::Loop(user) => render(jukebox.toggle_loop(user).await, |on| {
      format!("Looping {}", if on { "enabled" } else { "disabled" })
    }),
  };

  log_println!("{}", reply);
  true
}
