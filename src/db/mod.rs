//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Narrow storage contracts used by the ledger and rating pass
//! - The SQLite repository and an in-memory store implementing them

pub mod memory;
pub mod migrations;
pub mod repo;
pub mod store;

pub use memory::MemoryStore;
pub use migrations::init_db;
pub use repo::{MatchResult, NewMatch, NewSeasonEntry, Repository};
pub use store::{
    CoachStore, LeagueStore, LedgerWriter, MatchStore, PriceStore, RatingStore, RecordChange,
    RosterStore, SeasonStore, SlotChange, StoreError, TransactionLink, TransactionStore,
    UnitOfWork,
};
