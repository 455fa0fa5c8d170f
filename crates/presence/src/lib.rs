//! Viewer presence for live matches: room membership and typing flags on top
//! of a small expiring key/set store.

pub mod rooms;
pub mod store;
pub mod typing;

pub use rooms::RoomRegistry;
pub use store::{MemoryPresenceStore, PresenceError, PresenceStore, ScanCursor, ScanPage};
pub use typing::TypingTracker;
