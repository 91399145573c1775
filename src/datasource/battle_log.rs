//! Battle log parsing.
//!
//! A log is a sequence of `|`-delimited protocol lines, for example:
//!
//! ```text
//! |player|p1|Ash|
//! |poke|p1|Garchomp, L50, M|
//! |switch|p1a: Chompy|Garchomp, L50, M|100/100
//! |move|p1a: Chompy|Earthquake|p2a: Pex
//! |faint|p2a: Pex
//! |win|Ash
//! ```
//!
//! Units are identified by species; nicknames only live for the duration of the parse.
//! A faint is credited as a kill to the last opposing unit that acted on the fainted unit,
//! either by targeting it with a move or through an `[of]` damage source.

use std::collections::HashMap;

use serde::Serialize;

use super::ReplayError;
use crate::db::MatchResult;
use crate::domain::{MatchRecord, MatchSide, UnitName, UnitPerformance};

/// Kill/death line of one unit on one side of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitLine {
    pub side: MatchSide,
    pub unit: UnitName,
    pub kills: i32,
    pub deaths: i32,
}

/// Everything the league needs out of a battle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedBattle {
    /// Player names, p1 then p2.
    pub players: [String; 2],
    /// `None` for a tie or an unfinished battle.
    pub winner: Option<MatchSide>,
    pub units: Vec<UnitLine>,
}

impl ParsedBattle {
    pub fn deaths(&self, side: MatchSide) -> i32 {
        self.units
            .iter()
            .filter(|u| u.side == side)
            .map(|u| u.deaths)
            .sum()
    }

    /// Opposing losses minus own losses; equals the surviving-unit margin for even teams.
    pub fn differential(&self, side: MatchSide) -> i32 {
        self.deaths(opponent(side)) - self.deaths(side)
    }

    /// Map the battle onto a scheduled match.
    ///
    /// p1 plays as `entry1` unless `swap_sides` is set.
    pub fn into_result(
        self,
        record: &MatchRecord,
        replay_url: Option<String>,
        swap_sides: bool,
    ) -> Result<MatchResult, ReplayError> {
        let first = if swap_sides {
            MatchSide::Second
        } else {
            MatchSide::First
        };
        let entry_for = |side: MatchSide| {
            if side == first {
                record.entry1
            } else {
                record.entry2
            }
        };

        let winner = self.winner.ok_or_else(|| {
            ReplayError::Mismatch(format!("battle for match {} has no winner", record.id))
        })?;
        let differential1 = self.differential(first);

        let performances = self
            .units
            .iter()
            .map(|line| UnitPerformance {
                match_id: record.id,
                season_entry_id: entry_for(line.side),
                unit: line.unit.clone(),
                kills: line.kills,
                deaths: line.deaths,
            })
            .collect();

        Ok(MatchResult {
            winner: entry_for(winner),
            differential1,
            differential2: -differential1,
            replay_url,
            played_at: None,
            performances,
        })
    }
}

fn opponent(side: MatchSide) -> MatchSide {
    match side {
        MatchSide::First => MatchSide::Second,
        MatchSide::Second => MatchSide::First,
    }
}

fn side_index(side: MatchSide) -> usize {
    match side {
        MatchSide::First => 0,
        MatchSide::Second => 1,
    }
}

/// `p1`, `p1a`, `p2b`... to a side.
fn parse_side(token: &str) -> Option<MatchSide> {
    let token = token.trim();
    if token.starts_with("p1") {
        Some(MatchSide::First)
    } else if token.starts_with("p2") {
        Some(MatchSide::Second)
    } else {
        None
    }
}

/// `p1a: Chompy` to (side, nickname).
fn parse_ident(token: &str) -> Option<(MatchSide, String)> {
    let (position, nickname) = token.split_once(": ")?;
    Some((parse_side(position)?, nickname.trim().to_string()))
}

/// `Garchomp, L50, M` to `Garchomp`.
fn species(details: &str) -> &str {
    details.split(',').next().unwrap_or(details).trim()
}

type Ident = (usize, String);

#[derive(Default)]
struct LogParser {
    players: [Option<String>; 2],
    winner_name: Option<String>,
    units: Vec<UnitLine>,
    by_species: HashMap<Ident, usize>,
    by_nickname: HashMap<Ident, usize>,
    last_hit_by: HashMap<Ident, (MatchSide, String)>,
}

impl LogParser {
    fn line_for(&mut self, side: MatchSide, unit: &str) -> usize {
        let key = (side_index(side), unit.to_string());
        if let Some(&idx) = self.by_species.get(&key) {
            return idx;
        }

        // Team preview hides some formes behind a wildcard, e.g. `Urshifu-*`.
        let placeholder = self.by_species.iter().find_map(|((s, name), idx)| {
            let stem = name.strip_suffix('*')?;
            let matches = unit.starts_with(stem) || unit == stem.trim_end_matches('-');
            (*s == key.0 && matches).then(|| (name.clone(), *idx))
        });
        if let Some((name, idx)) = placeholder {
            self.by_species.remove(&(key.0, name));
            self.units[idx].unit = UnitName::new(unit);
            self.by_species.insert(key, idx);
            return idx;
        }

        self.units.push(UnitLine {
            side,
            unit: UnitName::new(unit),
            kills: 0,
            deaths: 0,
        });
        let idx = self.units.len() - 1;
        self.by_species.insert(key, idx);
        idx
    }

    fn record_hit(&mut self, attacker: &str, target: &str) {
        let (Some((a_side, a_nick)), Some((t_side, t_nick))) =
            (parse_ident(attacker), parse_ident(target))
        else {
            return;
        };
        if a_side != t_side {
            self.last_hit_by
                .insert((side_index(t_side), t_nick), (a_side, a_nick));
        }
    }

    fn unit_by_nickname(&mut self, side: MatchSide, nickname: &str) -> usize {
        match self.by_nickname.get(&(side_index(side), nickname.to_string())) {
            Some(&idx) => idx,
            None => self.line_for(side, nickname),
        }
    }

    fn feed(&mut self, line: &str) {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 2 || !parts[0].is_empty() {
            return;
        }
        let arg = |i: usize| parts.get(i).copied().unwrap_or("");

        match parts[1] {
            "player" => {
                let name = arg(3).trim();
                if let (Some(side), false) = (parse_side(arg(2)), name.is_empty()) {
                    self.players[side_index(side)] = Some(name.to_string());
                }
            }
            "poke" => {
                if let Some(side) = parse_side(arg(2)) {
                    self.line_for(side, species(arg(3)));
                }
            }
            "switch" | "drag" | "replace" => {
                if let Some((side, nickname)) = parse_ident(arg(2)) {
                    let idx = self.line_for(side, species(arg(3)));
                    self.by_nickname.insert((side_index(side), nickname), idx);
                }
            }
            "move" => self.record_hit(arg(2), arg(4)),
            "-damage" => {
                if let Some(source) = parts.iter().find_map(|p| p.strip_prefix("[of] ")) {
                    self.record_hit(source, arg(2));
                }
            }
            "faint" => {
                let Some((side, nickname)) = parse_ident(arg(2)) else {
                    return;
                };
                let victim = self.unit_by_nickname(side, &nickname);
                self.units[victim].deaths += 1;

                let credited = self
                    .last_hit_by
                    .get(&(side_index(side), nickname))
                    .cloned();
                if let Some((killer_side, killer_nick)) = credited {
                    let killer = self.unit_by_nickname(killer_side, &killer_nick);
                    self.units[killer].kills += 1;
                }
            }
            "win" => self.winner_name = Some(arg(2).trim().to_string()),
            _ => {}
        }
    }

    fn finish(self) -> Result<ParsedBattle, ReplayError> {
        let [Some(p1), Some(p2)] = self.players else {
            return Err(ReplayError::Parse("log does not name both players".to_string()));
        };

        let winner = match self.winner_name {
            None => None,
            Some(name) if name == p1 => Some(MatchSide::First),
            Some(name) if name == p2 => Some(MatchSide::Second),
            Some(name) => {
                return Err(ReplayError::Parse(format!(
                    "winner {} is neither {} nor {}",
                    name, p1, p2
                )))
            }
        };

        Ok(ParsedBattle {
            players: [p1, p2],
            winner,
            units: self.units,
        })
    }
}

/// Parse a raw battle log.
///
/// # Errors
///
/// `ReplayError::Parse` if the log does not name both players or declares a winner that
/// is not one of them. Unknown message types are ignored.
pub fn parse_battle_log(log: &str) -> Result<ParsedBattle, ReplayError> {
    let mut parser = LogParser::default();
    for line in log.lines() {
        parser.feed(line.trim_end());
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DivisionId, MatchId, SeasonEntryId, SeasonId, Week};

    const LOG: &str = "\
|j|☆Ash
|player|p1|Ash|1
|player|p2|Gary|2
|teamsize|p1|2
|teamsize|p2|2
|poke|p1|Garchomp, L50, M|
|poke|p1|Urshifu-*, L50, F|
|poke|p2|Toxapex, L50, F|
|poke|p2|Clefable, L50, F|
|start
|switch|p1a: Chompy|Garchomp, L50, M|100/100
|switch|p2a: Pex|Toxapex, L50, F|100/100
|turn|1
|move|p1a: Chompy|Earthquake|p2a: Pex
|-damage|p2a: Pex|40/100
|move|p2a: Pex|Scald|p1a: Chompy
|-damage|p1a: Chompy|30/100
|turn|2
|move|p1a: Chompy|Earthquake|p2a: Pex
|-damage|p2a: Pex|0 fnt
|faint|p2a: Pex
|switch|p2a: Clefable|Clefable, L50, F|100/100
|turn|3
|move|p2a: Clefable|Moonblast|p1a: Chompy
|-damage|p1a: Chompy|0 fnt
|faint|p1a: Chompy
|switch|p1a: Urshifu|Urshifu-Rapid-Strike, L50, F|100/100
|turn|4
|move|p2a: Clefable|Moonblast|p1a: Urshifu
|-damage|p1a: Urshifu|50/100
|-damage|p2a: Clefable|0 fnt|[from] item: Rocky Helmet|[of] p1a: Urshifu
|faint|p2a: Clefable
|
|win|Ash
";

    fn line<'a>(battle: &'a ParsedBattle, unit: &str) -> &'a UnitLine {
        battle
            .units
            .iter()
            .find(|u| u.unit.as_str() == unit)
            .unwrap()
    }

    #[test]
    fn test_parse_credits_kills_to_last_opposing_actor() {
        let battle = parse_battle_log(LOG).unwrap();

        assert_eq!(battle.players, ["Ash".to_string(), "Gary".to_string()]);
        assert_eq!(battle.winner, Some(MatchSide::First));
        assert_eq!(battle.units.len(), 4);

        let chomp = line(&battle, "Garchomp");
        assert_eq!((chomp.kills, chomp.deaths), (1, 1));
        let urshifu = line(&battle, "Urshifu-Rapid-Strike");
        assert_eq!((urshifu.kills, urshifu.deaths), (1, 0));
        let pex = line(&battle, "Toxapex");
        assert_eq!((pex.side, pex.kills, pex.deaths), (MatchSide::Second, 0, 1));
        let clef = line(&battle, "Clefable");
        assert_eq!((clef.kills, clef.deaths), (1, 1));

        assert_eq!(battle.differential(MatchSide::First), 1);
        assert_eq!(battle.differential(MatchSide::Second), -1);
    }

    #[test]
    fn test_into_result_maps_sides_to_entries() {
        let record = MatchRecord {
            id: MatchId::new(9),
            season_id: SeasonId::new(1),
            division_id: DivisionId::new(1),
            week: Week::new(3),
            entry1: SeasonEntryId::new(20),
            entry2: SeasonEntryId::new(10),
            winner: None,
            differential1: 0,
            differential2: 0,
            replay_url: None,
            played_at: None,
        };

        let straight = parse_battle_log(LOG)
            .unwrap()
            .into_result(&record, None, false)
            .unwrap();
        assert_eq!(straight.winner, SeasonEntryId::new(20));
        assert_eq!((straight.differential1, straight.differential2), (1, -1));

        let swapped = parse_battle_log(LOG)
            .unwrap()
            .into_result(&record, Some("https://replay/9".to_string()), true)
            .unwrap();
        assert_eq!(swapped.winner, SeasonEntryId::new(10));
        assert_eq!((swapped.differential1, swapped.differential2), (-1, 1));
        assert_eq!(swapped.replay_url.as_deref(), Some("https://replay/9"));
        let garchomp = swapped
            .performances
            .iter()
            .find(|p| p.unit.as_str() == "Garchomp")
            .unwrap();
        assert_eq!(garchomp.season_entry_id, SeasonEntryId::new(10));
        assert_eq!(garchomp.match_id, MatchId::new(9));
    }

    #[test]
    fn test_rejects_logs_without_players_or_with_stranger_winner() {
        let err = parse_battle_log("|player|p1|Ash|\n|win|Ash\n").unwrap_err();
        assert!(matches!(err, ReplayError::Parse(_)));

        let err = parse_battle_log("|player|p1|Ash|\n|player|p2|Gary|\n|win|Brock\n").unwrap_err();
        assert!(matches!(err, ReplayError::Parse(_)));
    }

    #[test]
    fn test_tie_has_no_winner() {
        let battle = parse_battle_log("|player|p1|Ash|\n|player|p2|Gary|\n|tie\n").unwrap();
        assert_eq!(battle.winner, None);
    }
}
