pub mod engine;
pub mod state;
pub mod store;

pub use engine::{EndOutcome, PlayOutcome, Player, TrackEnd};
pub use state::*;
pub use store::TrackStore;
