//! Parameter records accepted by the ledger operations.

use serde::{Deserialize, Serialize};

use crate::domain::{RosterSlot, SeasonEntryId, SlotId, UnitName, Week};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupParams {
    pub season_entry_id: SeasonEntryId,
    pub unit: UnitName,
    #[serde(default)]
    pub as_captain: bool,
    pub week: Week,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropParams {
    pub season_entry_id: SeasonEntryId,
    pub slot_id: SlotId,
    pub week: Week,
}

/// Pickup and drop executed together; at least one side must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    pub season_entry_id: SeasonEntryId,
    #[serde(default)]
    pub pickup: Option<UnitName>,
    #[serde(default)]
    pub pickup_as_captain: bool,
    #[serde(default)]
    pub drop_slot_id: Option<SlotId>,
    pub week: Week,
}

impl From<PickupParams> for SwapParams {
    fn from(p: PickupParams) -> Self {
        SwapParams {
            season_entry_id: p.season_entry_id,
            pickup: Some(p.unit),
            pickup_as_captain: p.as_captain,
            drop_slot_id: None,
            week: p.week,
        }
    }
}

impl From<DropParams> for SwapParams {
    fn from(p: DropParams) -> Self {
        SwapParams {
            season_entry_id: p.season_entry_id,
            pickup: None,
            pickup_as_captain: false,
            drop_slot_id: Some(p.slot_id),
            week: p.week,
        }
    }
}

/// Trade initiated by `season_entry_id`: `give` slots go to the partner, `receive` slots come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeParams {
    pub season_entry_id: SeasonEntryId,
    pub partner_id: SeasonEntryId,
    #[serde(default)]
    pub give: Vec<SlotId>,
    #[serde(default)]
    pub receive: Vec<SlotId>,
    pub week: Week,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeraSwapParams {
    pub season_entry_id: SeasonEntryId,
    pub new_captain_slot_id: SlotId,
    #[serde(default)]
    pub old_captain_slot_id: Option<SlotId>,
    pub week: Week,
}

/// Administrative draft seeding of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPickParams {
    pub season_entry_id: SeasonEntryId,
    pub unit: UnitName,
    #[serde(default)]
    pub as_captain: bool,
}

/// A roster slot annotated with its trade-lock state for a given week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    #[serde(flatten)]
    pub slot: RosterSlot,
    pub trade_locked: bool,
    pub locked_until: Option<Week>,
}
