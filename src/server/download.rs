//! Download Pipeline: resolve + fetch on a blocking worker, result back
//! through the mailbox.

use std::{path::PathBuf, sync::Arc};

use tracing::{debug, error};

use crate::{
  common::types::SessionId,
  player::{state::TrackInfo, store::discard_file},
  server::messages::{Message, Reply},
  sources::SourceManager,
};

pub struct DownloadJob {
  pub session: SessionId,
  pub job: u64,
  pub url: String,
  pub bump: bool,
  pub dir: PathBuf,
  pub reply: Reply<TrackInfo>,
}

pub fn spawn_download(
  sources: Arc<SourceManager>,
  mailbox: flume::Sender<Message>,
  job: DownloadJob,
) {
  let DownloadJob {
    session,
    job,
    url,
    bump,
    dir,
    reply,
  } = job;

  tokio::task::spawn_blocking(move || {
    debug!("Download job {} started for {}", job, url);
    let result = sources.download(&url, &dir, job).map_err(|e| {
      error!("Download job {} for {} failed: {}", job, url, e);
      e.to_string()
    });

    let msg = Message::DownloadFinished {
      session,
      job,
      bump,
      result,
      reply,
    };
    if let Err(flume::SendError(Message::DownloadFinished {
      result: Ok(track), ..
    })) = mailbox.send(msg)
    {
      // Actor is gone; nobody will queue or delete this file.
      discard_file(&track.local_path);
    }
  });
}
