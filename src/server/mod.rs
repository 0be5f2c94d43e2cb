pub mod download;
pub mod messages;
pub mod monitor;
pub mod session;
pub mod session_manager;

pub use messages::{JoinOutcome, QueueSnapshot};
pub use session::Session;
pub use session_manager::Jukebox;
