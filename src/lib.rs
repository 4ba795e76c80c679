// Hotel booking assistant
// Inventory data pipeline, room pricing and a tool-calling chat orchestrator

pub mod config;
pub mod data_store;
pub mod hotel_data;
pub mod inventory;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod refresh;
pub mod server;

// Re-export key types for convenience
pub use config::{AppConfig, ConfigError, ServerConfig};
pub use data_store::{
    CacheRecord, DataStore, DataStoreConfig, DataStoreError, HttpInventorySource,
    InventorySource, InventorySourceConfig,
};
pub use hotel_data::{HotelSnapshot, Provenance, RoomRecord, RoomTypeId};
pub use inventory::{
    AvailabilityReport, HotelInfo, InventoryConfig, InventoryEngine, InventoryError, PriceQuote,
    StayDates,
};
pub use llm::{GeminiClient, ModelClient, ModelConfig, ModelError};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use orchestrator::{
    AssistantError, ConversationOrchestrator, ConversationRole, ConversationTurn, ExchangeOutcome,
};
pub use refresh::spawn_daily_refresh;
pub use server::{create_router, AppState};
