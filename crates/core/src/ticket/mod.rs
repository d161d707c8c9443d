//! Asset replacement tickets and their storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub use store::{
    CreateTicketRequest, TicketError, TicketFilter, TicketStore, UpdateTicketRequest, UpsertStore,
};
pub use types::{Ticket, TicketStage, TicketSummary, UnknownStage};
