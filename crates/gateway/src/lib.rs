// Matchcast Gateway - live match rooms over WebSocket
//
// Viewers join a match room, receive simulation updates as they are persisted,
// chat and share typing status with the rest of the room.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod session;

pub use handlers::MatchHandlers;
pub use protocol::{ClientMessage, ProtocolError, RoomRequest, ServerMessage};
pub use server::GatewayServer;
pub use session::{GatewaySession, RoomBinding, SessionManager};
