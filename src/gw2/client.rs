use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;

use super::models::{MatchEntry, ScoreTriple, WorldName};

/// Client for the GW2 v1 web API (read-only, no auth).
#[derive(Clone)]
pub struct Gw2Client {
    http: Client,
    /// Base URL, overridable for tests
    base_url: String,
    lang: String,
}

impl Gw2Client {
    pub fn new(base_url: &str, lang: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Gw2Client {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            lang: lang.to_string(),
        })
    }

    /// Fetch the full world-name list (realm id → display name).
    pub async fn fetch_world_names(&self) -> Result<Vec<WorldName>> {
        let url = format!("{}/v1/world_names.json?lang={}", self.base_url, self.lang);
        debug!("Fetching world names from {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("World name request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("World name endpoint error: {}", resp.status());
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse world name response")?;

        parse_world_names(&raw)
    }

    /// Fetch the list of currently active WvW matches.
    pub async fn fetch_match_overview(&self) -> Result<Vec<MatchEntry>> {
        let url = format!("{}/v1/wvw/matches.json", self.base_url);
        debug!("Fetching match overview from {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Match list request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Match list endpoint error: {}", resp.status());
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse match list response")?;

        parse_match_overview(&raw)
    }

    /// Fetch the current red/blue/green score triple for one match.
    pub async fn fetch_match_scores(&self, match_id: &str) -> Result<ScoreTriple> {
        let url = format!(
            "{}/v1/wvw/match_details.json?match_id={}",
            self.base_url, match_id
        );
        debug!("Fetching match details from {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Match detail request for {} failed", match_id))?;

        if !resp.status().is_success() {
            anyhow::bail!(
                "Match detail endpoint error for {}: {}",
                match_id,
                resp.status()
            );
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse match detail response")?;

        parse_match_scores(&raw)
    }
}

// ── Parsing helpers ────────────────────────────────────────────────────────────

fn parse_world_names(raw: &serde_json::Value) -> Result<Vec<WorldName>> {
    let items = raw
        .as_array()
        .context("World name response is not an array")?;

    let worlds = items
        .iter()
        .filter_map(|item| {
            let id = int_field(&item["id"])?;
            let name = item["name"].as_str()?.to_string();
            Some(WorldName { id, name })
        })
        .collect();

    Ok(worlds)
}

fn parse_match_overview(raw: &serde_json::Value) -> Result<Vec<MatchEntry>> {
    let items = raw["wvw_matches"]
        .as_array()
        .context("Match list response has no wvw_matches array")?;

    let entries = items
        .iter()
        .filter_map(|item| {
            Some(MatchEntry {
                match_id: item["wvw_match_id"].as_str()?.to_string(),
                red_world_id: int_field(&item["red_world_id"])?,
                blue_world_id: int_field(&item["blue_world_id"])?,
                green_world_id: int_field(&item["green_world_id"])?,
            })
        })
        .collect();

    Ok(entries)
}

fn parse_match_scores(raw: &serde_json::Value) -> Result<ScoreTriple> {
    let scores = raw["scores"]
        .as_array()
        .context("Match detail response has no scores array")?;

    if scores.len() != 3 {
        anyhow::bail!("Expected three scores, got {}", scores.len());
    }

    let score = |idx: usize| {
        scores[idx]
            .as_u64()
            .with_context(|| format!("scores[{}] is not an integer", idx))
    };

    Ok(ScoreTriple {
        red: score(0)?,
        blue: score(1)?,
        green: score(2)?,
    })
}

/// The v1 API serves some integer ids as JSON strings; accept both.
fn int_field(v: &serde_json::Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_world_names_keeps_every_item() {
        let raw = json!([
            { "id": "1001", "name": "Tarnished Coast" },
            { "id": 1002, "name": "Sea of Sorrows" },
        ]);
        let worlds = parse_world_names(&raw).unwrap();
        assert_eq!(worlds.len(), 2);
        assert_eq!(worlds[0].id, 1001);
        assert_eq!(worlds[0].name, "Tarnished Coast");
        assert_eq!(worlds[1].id, 1002);
    }

    #[test]
    fn test_parse_world_names_skips_malformed_items() {
        let raw = json!([
            { "id": "1001", "name": "Tarnished Coast" },
            { "id": "not-a-number", "name": "Broken" },
            { "name": "No Id" },
        ]);
        let worlds = parse_world_names(&raw).unwrap();
        assert_eq!(worlds.len(), 1);
    }

    #[test]
    fn test_parse_world_names_rejects_non_array() {
        let raw = json!({ "error": "maintenance" });
        assert!(parse_world_names(&raw).is_err());
    }

    #[test]
    fn test_parse_match_overview_preserves_response_order() {
        let raw = json!({
            "wvw_matches": [
                { "wvw_match_id": "1-4", "red_world_id": 1001, "blue_world_id": 1002, "green_world_id": 1003 },
                { "wvw_match_id": "2-1", "red_world_id": "2001", "blue_world_id": "2002", "green_world_id": "2003" },
            ]
        });
        let entries = parse_match_overview(&raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].match_id, "1-4");
        assert_eq!(entries[1].match_id, "2-1");
        assert_eq!(entries[1].green_world_id, 2003);
    }

    #[test]
    fn test_parse_match_overview_rejects_missing_wrapper() {
        let raw = json!([ { "wvw_match_id": "1-1" } ]);
        assert!(parse_match_overview(&raw).is_err());
    }

    #[test]
    fn test_parse_match_scores() {
        let raw = json!({ "match_id": "1-4", "scores": [50, 30, 20] });
        let triple = parse_match_scores(&raw).unwrap();
        assert_eq!(
            triple,
            ScoreTriple {
                red: 50,
                blue: 30,
                green: 20
            }
        );
    }

    #[test]
    fn test_parse_match_scores_rejects_short_array() {
        let raw = json!({ "scores": [50, 30] });
        assert!(parse_match_scores(&raw).is_err());
    }

    #[test]
    fn test_parse_match_scores_rejects_missing_scores() {
        let raw = json!({ "match_id": "1-4" });
        assert!(parse_match_scores(&raw).is_err());
    }
}
