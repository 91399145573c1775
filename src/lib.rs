pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod recompute;

pub use config::Config;
pub use datasource::{HttpReplaySource, MockReplaySource, ReplayError, ReplaySource};
pub use db::{init_db, MemoryStore, Repository};
pub use domain::{
    Coach, CoachId, DivisionId, MatchId, Points, SeasonEntryId, SeasonId, SlotId, TransactionId,
    UnitName, Week,
};
pub use error::AppError;
pub use ledger::{Ledger, LedgerConfig, LedgerError};
pub use recompute::{PassError, PassSummary, RatingPass};
