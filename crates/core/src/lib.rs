pub mod batch;
pub mod config;
pub mod metrics;
pub mod ratelimit;
pub mod ticket;

pub use batch::{
    BatchCoordinator, BatchError, BatchResult, CsvSource, JsonSource, RawRecord, RecordSource,
    RowError, RowOutcome, UpsertCommand,
};
pub use config::{
    load_config, load_config_from_str, validate_config, BatchConfig, Config, ConfigError,
    DatabaseConfig, RateLimitConfig, ServerConfig,
};
pub use ratelimit::{RateLimiter, TokenBucket};
pub use ticket::{
    CreateTicketRequest, SqliteTicketStore, Ticket, TicketError, TicketFilter, TicketStage,
    TicketStore, TicketSummary, UpdateTicketRequest, UpsertStore,
};
