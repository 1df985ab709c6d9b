pub mod message_router;
pub mod message_store;
pub mod presence;
pub mod replay_service;

pub use message_router::MessageRouter;
pub use message_store::{MessageStore, PgMessageStore};
pub use presence::PresenceBroadcaster;
pub use replay_service::ReplayService;
