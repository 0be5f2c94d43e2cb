use std::{path::Path, sync::Arc};

use crate::common::types::AnyResult;

/// Called exactly once when a track started with [`AudioSink::play`] ends,
/// whether it finished, was stopped or failed. Carries the error text on
/// failure.
pub type CompletionHook = Box<dyn FnOnce(Option<String>) + Send + 'static>;

/// Local audio output bound to one voice connection.
pub trait AudioSink: Send + Sync {
  /// Starts playing `path`. On `Err` the hook is dropped without being called.
  fn play(&self, path: &Path, on_complete: CompletionHook) -> AnyResult<()>;

  fn pause(&self);

  fn resume(&self);

  /// Halts the current track. Its hook still fires.
  fn stop(&self);

  fn is_playing(&self) -> bool;

  fn is_paused(&self) -> bool;

  /// Frees the decoder resources of the last track. Safe to call repeatedly.
  fn release(&self);
}

pub type BoxedSink = Arc<dyn AudioSink>;
