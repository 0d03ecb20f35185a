use std::collections::HashMap;

/// Integer world/server id as used by the GW2 API.
pub type RealmId = u64;

/// One entry of the world-name list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldName {
    pub id: RealmId,
    pub name: String,
}

/// id → display-name directory for all game worlds.
///
/// Reloading replaces the whole mapping; entries from a previous load
/// never survive a successful reload.
#[derive(Debug, Default)]
pub struct RealmDirectory {
    names: HashMap<RealmId, String>,
}

impl RealmDirectory {
    pub fn new() -> Self {
        RealmDirectory {
            names: HashMap::new(),
        }
    }

    /// Replace every entry with the given world list.
    pub fn replace_all(&mut self, worlds: Vec<WorldName>) {
        self.names = worlds.into_iter().map(|w| (w.id, w.name)).collect();
    }

    /// Look up a realm name. An unknown id is not an error.
    pub fn resolve(&self, id: RealmId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One entry of the active-match list: the match id plus the three
/// participant world ids, names not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    pub match_id: String,
    pub red_world_id: RealmId,
    pub blue_world_id: RealmId,
    pub green_world_id: RealmId,
}

/// Raw score triple from the match-details endpoint, in score units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreTriple {
    pub red: u64,
    pub blue: u64,
    pub green: u64,
}

impl ScoreTriple {
    /// Floor-normalized percentage per color, computed independently;
    /// the three values are not forced to sum to 100. A zero total
    /// reports 0/0/0 (a match that has not scored yet).
    pub fn percentages(&self) -> ScorePercentages {
        let total = self.red + self.blue + self.green;
        if total == 0 {
            return ScorePercentages {
                red: 0,
                blue: 0,
                green: 0,
            };
        }
        ScorePercentages {
            red: (self.red * 100 / total) as u8,
            blue: (self.blue * 100 / total) as u8,
            green: (self.green * 100 / total) as u8,
        }
    }
}

/// Percentage scores attached to a summary once enrichment completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorePercentages {
    pub red: u8,
    pub blue: u8,
    pub green: u8,
}

/// A joined match record as served to the device.
///
/// Realm names are resolved at list-build time against the directory;
/// an id without a directory entry leaves the name absent. Scores stay
/// `None` until the enrichment fetch for this match resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub match_id: String,
    pub red_realm: Option<String>,
    pub blue_realm: Option<String>,
    pub green_realm: Option<String>,
    pub scores: Option<ScorePercentages>,
}

impl MatchSummary {
    /// Only fully enriched summaries may be sent to the device.
    pub fn is_dispatchable(&self) -> bool {
        self.scores.is_some()
    }
}
