//! Infrastructure layer - Adapters for the engine's ports
//!
//! This layer contains:
//! - Config: player configuration from the environment
//! - JSONLogic: the default rule language
//! - Variables: in-memory dotted-path variable store
//! - Content: experience repository serving all four fetchers
//! - Sessions: in-memory and JSON file session stores
//! - Observer: channel-backed event publisher

pub mod channel_observer;
pub mod config;
pub mod experience_repository;
pub mod json_logic;
pub mod object_data_resolver;
pub mod session_store;

pub use channel_observer::{ChannelObserver, PlayerEvent};
pub use config::PlayerConfig;
pub use experience_repository::InMemoryExperienceRepository;
pub use json_logic::JsonLogicEvaluator;
pub use object_data_resolver::ObjectDataResolver;
pub use session_store::{InMemorySessionStore, JsonFileSessionStore};
