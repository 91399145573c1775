//! Domain primitives: entity ids, Week, UnitName.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// League participant id.
    CoachId
);
entity_id!(
    /// Season id (storage key, not the chronological ordinal).
    SeasonId
);
entity_id!(
    /// Division id, scoped to one season.
    DivisionId
);
entity_id!(
    /// A coach's participation in one division of one season.
    SeasonEntryId
);
entity_id!(
    /// Roster slot id.
    SlotId
);
entity_id!(
    /// Ledger transaction id.
    TransactionId
);
entity_id!(
    /// Match id.
    MatchId
);

/// Budget points. Always integral.
pub type Points = i64;

/// League week. Values above [`Week::REGULAR_SEASON_MAX`] encode playoff rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Week(pub i32);

impl Week {
    pub const REGULAR_SEASON_MAX: i32 = 100;
    pub const QUARTERFINAL: i32 = 101;
    pub const SEMIFINAL: i32 = 102;
    pub const FINAL: i32 = 103;

    pub fn new(week: i32) -> Self {
        Week(week)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }

    pub fn is_regular_season(&self) -> bool {
        self.0 <= Self::REGULAR_SEASON_MAX
    }

    /// Week `n` weeks after this one.
    pub fn plus(&self, n: i32) -> Week {
        Week(self.0.saturating_add(n))
    }
}

impl std::fmt::Display for Week {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Self::QUARTERFINAL => write!(f, "quarterfinal"),
            Self::SEMIFINAL => write!(f, "semifinal"),
            Self::FINAL => write!(f, "final"),
            w => write!(f, "week {}", w),
        }
    }
}

/// Name of a draftable unit (e.g. "Great Tusk").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(pub String);

impl UnitName {
    pub fn new(name: impl Into<String>) -> Self {
        UnitName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
