pub mod client;
pub mod models;

pub use client::Gw2Client;
pub use models::{
    MatchEntry, MatchSummary, RealmDirectory, RealmId, ScorePercentages, ScoreTriple, WorldName,
};
