//! `DecoderSink` — decodes a local file with symphonia on its own thread and
//! pushes interleaved i16 PCM frames to the voice transport at real-time pace.

use std::{
  fs::File,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
  },
  thread::JoinHandle,
  time::Duration,
};

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use symphonia::core::{
  audio::SampleBuffer,
  codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions},
  errors::Error,
  formats::{FormatOptions, FormatReader},
  io::MediaSourceStream,
  meta::MetadataOptions,
  probe::Hint,
};
use tracing::{Level, debug, span, warn};

use crate::{
  audio::sink::{AudioSink, CompletionHook},
  common::types::AnyResult,
};

/// One decoded packet worth of audio.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrame {
  pub samples: Vec<i16>,
  pub sample_rate: u32,
  pub channels: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(u8)]
enum SlotState {
  Playing = 0,
  Paused = 1,
  Stopping = 2,
  Finished = 3,
}

impl SlotState {
  fn from_u8(v: u8) -> Self {
    match v {
      0 => Self::Playing,
      1 => Self::Paused,
      2 => Self::Stopping,
      _ => Self::Finished,
    }
  }
}

/// The decoder thread of the loaded track.
struct Slot {
  state: Arc<AtomicU8>,
  worker: JoinHandle<()>,
}

impl Slot {
  fn state(&self) -> SlotState {
    SlotState::from_u8(self.state.load(Ordering::Acquire))
  }

  fn transition(&self, from: SlotState, to: SlotState) -> bool {
    self
      .state
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  fn halt(&self) {
    if !self.transition(SlotState::Playing, SlotState::Stopping) {
      self.transition(SlotState::Paused, SlotState::Stopping);
    }
  }
}

pub struct DecoderSink {
  frames: Sender<PcmFrame>,
  slot: Mutex<Option<Slot>>,
}

impl DecoderSink {
  /// Creates a sink and the receiver the voice transport reads frames from.
  pub fn new() -> (Self, Receiver<PcmFrame>) {
    let (tx, rx) = flume::bounded(64);
    (
      Self {
        frames: tx,
        slot: Mutex::new(None),
      },
      rx,
    )
  }

  fn open(path: &Path) -> AnyResult<(Box<dyn FormatReader>, Box<dyn Decoder>, u32)> {
    let file = File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
      hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe().format(
      &hint,
      mss,
      &FormatOptions::default(),
      &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let track = format
      .tracks()
      .iter()
      .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
      .ok_or("no audio track found")?;
    let track_id = track.id;
    let decoder =
      symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    Ok((format, decoder, track_id))
  }
}

impl AudioSink for DecoderSink {
  fn play(&self, path: &Path, on_complete: CompletionHook) -> AnyResult<()> {
    let (format, decoder, track_id) = Self::open(path)?;

    let state = Arc::new(AtomicU8::new(SlotState::Playing as u8));
    let thread_state = state.clone();
    let frames = self.frames.clone();
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();

    let worker = std::thread::Builder::new()
      .name("jukebox-decoder".into())
      .spawn(move || {
        let _span = span!(Level::DEBUG, "decoder", file = %name).entered();
        let result = decode_loop(format, decoder, track_id, &thread_state, &frames);
        thread_state.store(SlotState::Finished as u8, Ordering::Release);
        debug!("Decoder finished: {:?}", result);
        on_complete(result.err());
      })?;

    let previous = self.slot.lock().replace(Slot { state, worker });
    if let Some(previous) = previous {
      previous.halt();
    }
    Ok(())
  }

  fn pause(&self) {
    if let Some(slot) = self.slot.lock().as_ref() {
      slot.transition(SlotState::Playing, SlotState::Paused);
    }
  }

  fn resume(&self) {
    if let Some(slot) = self.slot.lock().as_ref() {
      slot.transition(SlotState::Paused, SlotState::Playing);
    }
  }

  fn stop(&self) {
    if let Some(slot) = self.slot.lock().as_ref() {
      slot.halt();
    }
  }

  fn is_playing(&self) -> bool {
    self
      .slot
      .lock()
      .as_ref()
      .is_some_and(|s| s.state() == SlotState::Playing)
  }

  fn is_paused(&self) -> bool {
    self
      .slot
      .lock()
      .as_ref()
      .is_some_and(|s| s.state() == SlotState::Paused)
  }

  fn release(&self) {
    let Some(slot) = self.slot.lock().take() else {
      return;
    };
    if slot.state() == SlotState::Finished {
      if slot.worker.join().is_err() {
        warn!("Decoder thread panicked");
      }
    } else {
      // Still winding down; it exits on its own once it sees Stopping.
      slot.halt();
    }
  }
}

impl Drop for DecoderSink {
  fn drop(&mut self) {
    if let Some(slot) = self.slot.get_mut().take() {
      slot.halt();
    }
  }
}

/// Runs until the stream ends, the slot is stopped or the transport hangs up.
fn decode_loop(
  mut format: Box<dyn FormatReader>,
  mut decoder: Box<dyn Decoder>,
  track_id: u32,
  state: &AtomicU8,
  frames: &Sender<PcmFrame>,
) -> Result<(), String> {
  let mut sample_buf: Option<SampleBuffer<i16>> = None;

  loop {
    match SlotState::from_u8(state.load(Ordering::Acquire)) {
      SlotState::Paused => {
        std::thread::sleep(Duration::from_millis(20));
        continue;
      }
      SlotState::Stopping | SlotState::Finished => return Ok(()),
      SlotState::Playing => {}
    }

    let packet = match format.next_packet() {
      Ok(p) => p,
      Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
      Err(Error::ResetRequired) => return Ok(()),
      Err(e) => return Err(format!("Packet read error: {e}")),
    };

    if packet.track_id() != track_id {
      continue;
    }

    match decoder.decode(&packet) {
      Ok(decoded) => {
        let spec = *decoded.spec();
        let frame_count = decoded.frames();
        let buf = sample_buf
          .get_or_insert_with(|| SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
        buf.copy_interleaved_ref(decoded);

        if buf.samples().is_empty() {
          continue;
        }

        let frame = PcmFrame {
          samples: buf.samples().to_vec(),
          sample_rate: spec.rate,
          channels: spec.channels.count() as u16,
        };
        if frames.send(frame).is_err() {
          return Ok(());
        }

        if spec.rate > 0 {
          std::thread::sleep(Duration::from_secs_f64(
            frame_count as f64 / spec.rate as f64,
          ));
        }
      }
      Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
      Err(Error::DecodeError(e)) => {
        warn!("Decode error (recoverable): {e}");
        continue;
      }
      Err(e) => return Err(format!("Decode error: {e}")),
    }
  }
}
