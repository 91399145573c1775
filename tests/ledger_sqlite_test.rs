use draftleague::db::{init_db, NewSeasonEntry, RosterStore, SeasonStore};
use draftleague::domain::{AcquisitionMethod, PriceEntry, RosterSlot, TransactionKind};
use draftleague::ledger::{DraftPickParams, PickupParams, TeraSwapParams, TradeParams};
use draftleague::{Ledger, LedgerConfig, LedgerError, Repository, SeasonEntryId, SeasonId, UnitName, Week};
use std::sync::Arc;
use tempfile::TempDir;

struct League {
    repo: Arc<Repository>,
    ledger: Ledger,
    alder: SeasonEntryId,
    bea: SeasonEntryId,
    _temp: TempDir,
}

fn price(season: SeasonId, unit: &str, price: i64, surcharge: Option<i64>) -> PriceEntry {
    PriceEntry {
        season_id: season,
        unit: UnitName::new(unit),
        price,
        tera_banned: false,
        captain_surcharge: surcharge,
        ban_reason: None,
    }
}

async fn setup_league() -> League {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("league.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let season = repo.create_season(1, "Season 1").await.unwrap();
    let division = repo.create_division(season.id, "Premier").await.unwrap();
    let mut ids = Vec::new();
    for name in ["Alder", "Bea"] {
        let coach = repo.create_coach(name).await.unwrap();
        let entry = repo
            .create_entry(&NewSeasonEntry {
                coach_id: Some(coach.id),
                division_id: division.id,
                team_name: format!("{} FC", name),
                team_abbreviation: name[..2].to_uppercase(),
                budget: 60,
            })
            .await
            .unwrap();
        ids.push(entry.id);
    }

    for p in [
        price(season.id, "Garchomp", 30, Some(4)),
        price(season.id, "Toxapex", 20, None),
        price(season.id, "Clefable", 15, Some(2)),
    ] {
        repo.upsert_price(&p).await.unwrap();
    }

    let ledger = Ledger::new(repo.clone(), LedgerConfig::default());
    League {
        repo,
        ledger,
        alder: ids[0],
        bea: ids[1],
        _temp: temp_dir,
    }
}

impl League {
    async fn budget(&self, entry: SeasonEntryId) -> i64 {
        self.repo.get_entry(entry).await.unwrap().unwrap().remaining_budget
    }

    async fn slot(&self, entry: SeasonEntryId, unit: &str) -> Option<RosterSlot> {
        self.repo
            .list_slots(entry)
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.unit.as_str() == unit)
    }

    async fn draft(&self, entry: SeasonEntryId, unit: &str) -> RosterSlot {
        self.ledger
            .draft_pick(DraftPickParams {
                season_entry_id: entry,
                unit: UnitName::new(unit),
                as_captain: false,
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_draft_pickup_trade_and_undo_over_sqlite() {
    let league = setup_league().await;

    let garchomp = league.draft(league.alder, "Garchomp").await;
    let toxapex = league.draft(league.bea, "Toxapex").await;
    assert_eq!(garchomp.acquisition_method(), AcquisitionMethod::Draft);
    assert_eq!(league.budget(league.alder).await, 30);
    assert_eq!(league.budget(league.bea).await, 40);

    let pickup = league
        .ledger
        .fa_pickup(PickupParams {
            season_entry_id: league.alder,
            unit: UnitName::new("Clefable"),
            as_captain: false,
            week: Week::new(1),
        })
        .await
        .unwrap();
    assert_eq!(pickup.kind, TransactionKind::FaPickup);
    assert_eq!(pickup.budget_change, -15);
    assert_eq!(league.budget(league.alder).await, 15);

    let clefable = league.slot(league.alder, "Clefable").await.unwrap();
    let locked = league
        .ledger
        .p2p_trade(TradeParams {
            season_entry_id: league.alder,
            partner_id: league.bea,
            give: vec![clefable.id],
            receive: vec![toxapex.id],
            week: Week::new(2),
        })
        .await
        .unwrap_err();
    assert!(matches!(locked, LedgerError::TradeLocked { until, .. } if until == Week::new(3)));

    let trade = league
        .ledger
        .p2p_trade(TradeParams {
            season_entry_id: league.alder,
            partner_id: league.bea,
            give: vec![garchomp.id],
            receive: vec![toxapex.id],
            week: Week::new(2),
        })
        .await
        .unwrap();
    assert_eq!(trade.budget_change, -10);
    assert_eq!(league.budget(league.alder).await, 5);
    assert_eq!(league.budget(league.bea).await, 50);
    let moved = league.slot(league.bea, "Garchomp").await.unwrap();
    assert_eq!(moved.acquired_via, Some(AcquisitionMethod::P2pTrade));
    assert_eq!(moved.acquired_transaction_id, Some(trade.id));

    league.ledger.undo(trade.id).await.unwrap();
    assert_eq!(league.budget(league.alder).await, 15);
    assert_eq!(league.budget(league.bea).await, 40);
    let restored = league.slot(league.alder, "Garchomp").await.unwrap();
    assert_eq!(restored.id, garchomp.id);
    assert_eq!(restored.acquisition_method(), AcquisitionMethod::Draft);
    assert!(league.slot(league.alder, "Toxapex").await.is_none());

    let quota = league.ledger.quota(league.alder).await.unwrap();
    assert_eq!(quota.fa_used, 1);
    assert_eq!(quota.trade_used, 0);
}

#[tokio::test]
async fn test_concurrent_pickups_of_one_unit_admit_exactly_one() {
    let league = setup_league().await;

    let attempts = [league.alder, league.bea].map(|entry| {
        let ledger = league.ledger.clone();
        tokio::spawn(async move {
            ledger
                .fa_pickup(PickupParams {
                    season_entry_id: entry,
                    unit: UnitName::new("Garchomp"),
                    as_captain: false,
                    week: Week::new(1),
                })
                .await
        })
    });

    let mut successes = 0;
    for handle in attempts {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);

    let holders = [
        league.slot(league.alder, "Garchomp").await,
        league.slot(league.bea, "Garchomp").await,
    ];
    assert_eq!(holders.iter().filter(|s| s.is_some()).count(), 1);
    assert_eq!(league.budget(league.alder).await + league.budget(league.bea).await, 90);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tera_swaps_charge_surcharge_once() {
    let league = setup_league().await;
    let garchomp = league.draft(league.alder, "Garchomp").await;
    assert_eq!(league.budget(league.alder).await, 30);

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let ledger = league.ledger.clone();
            let entry = league.alder;
            let slot = garchomp.id;
            tokio::spawn(async move {
                ledger
                    .tera_swap(TeraSwapParams {
                        season_entry_id: entry,
                        new_captain_slot_id: slot,
                        old_captain_slot_id: None,
                        week: Week::new(1),
                    })
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in attempts {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);

    let captain = league.slot(league.alder, "Garchomp").await.unwrap();
    assert!(captain.is_tera_captain);
    assert_eq!(captain.price, 34);
    assert_eq!(league.budget(league.alder).await, 26);
    assert_eq!(league.ledger.transactions(league.alder).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_draft_picks_all_commit() {
    let league = setup_league().await;
    let entry = league.repo.get_entry(league.alder).await.unwrap().unwrap();
    let division = league.repo.get_division(entry.division_id).await.unwrap().unwrap();
    let units = ["Corviknight", "Dragapult", "Heatran", "Landorus", "Kingambit", "Zapdos"];
    for unit in units {
        league.repo.upsert_price(&price(division.season_id, unit, 2, None)).await.unwrap();
    }

    let picks: Vec<_> = units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            let ledger = league.ledger.clone();
            let entry = if i % 2 == 0 { league.alder } else { league.bea };
            let unit = UnitName::new(*unit);
            tokio::spawn(async move {
                ledger
                    .draft_pick(DraftPickParams {
                        season_entry_id: entry,
                        unit,
                        as_captain: false,
                    })
                    .await
            })
        })
        .collect();

    for handle in picks {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(league.budget(league.alder).await, 54);
    assert_eq!(league.budget(league.bea).await, 54);
    assert_eq!(league.repo.list_slots(league.alder).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_failed_pickup_leaves_budget_and_roster_untouched() {
    let league = setup_league().await;
    league.draft(league.alder, "Garchomp").await;
    league
        .ledger
        .fa_pickup(PickupParams {
            season_entry_id: league.alder,
            unit: UnitName::new("Toxapex"),
            as_captain: false,
            week: Week::new(1),
        })
        .await
        .unwrap();
    assert_eq!(league.budget(league.alder).await, 10);

    let err = league
        .ledger
        .fa_pickup(PickupParams {
            season_entry_id: league.alder,
            unit: UnitName::new("Clefable"),
            as_captain: false,
            week: Week::new(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientBudget {
            required: 15,
            available: 10,
            shortfall: 5,
            ..
        }
    ));

    assert_eq!(league.budget(league.alder).await, 10);
    assert!(league.slot(league.alder, "Clefable").await.is_none());
    assert_eq!(league.ledger.transactions(league.alder).await.unwrap().len(), 1);
}
