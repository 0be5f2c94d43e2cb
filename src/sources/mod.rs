pub mod manager;
pub mod plugin;
pub mod ytdlp;

pub use manager::SourceManager;
pub use plugin::{BoxedResolver, MediaResolver, ResolvedTrack};
