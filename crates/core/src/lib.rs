pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod simulation;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, GatewayConfig, PresenceConfig, SimulationConfig, StoreConfig};
pub use error::{DomainError, InfraError, MatchcastError};
pub use model::{Match, MatchEvent, MatchEventType, MatchStatus, Side, Team};
pub use notify::{Notification, NotificationBus};
pub use simulation::{LifecycleDriver, TickOutcome, TickReport, TickScheduler};
pub use stats::{load_match_detail, MatchDetail, MatchStats, SideStats};
pub use store::{InMemoryStore, MatchStore, SqliteStore};
