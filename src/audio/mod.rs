pub mod decoder_sink;
pub mod sink;

pub use decoder_sink::{DecoderSink, PcmFrame};
pub use sink::{AudioSink, BoxedSink, CompletionHook};
