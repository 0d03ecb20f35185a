//! Coordinating session owning all match state.
//!
//! Every piece of mutable state (realm directory, match list, dispatch
//! cursor, list generation) lives here and is touched only by the
//! session task, so no locking is needed anywhere:
//!
//! ```text
//!  device bridge ──DeviceEvent──▶ CompanionSession::run
//!                                     │  ready / mode 0 → refresh
//!                                     │  other message  → dispatch_next
//!       enrichment tasks ──EnrichmentUpdate──▶ apply_enrichment
//! ```
//!
//! A refresh chains two fetches (world names, then the match list) and
//! fans out one spawned score fetch per match without awaiting any of
//! them. Each fan-out carries the list generation current at launch;
//! completions that arrive after the list has been replaced are
//! discarded instead of enriching an orphaned entry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::device::{DeviceEvent, DeviceLink, MatchFrame, UPDATE_MODE_REFRESH};
use crate::gw2::{Gw2Client, MatchEntry, MatchSummary, RealmDirectory, ScorePercentages};

/// Completion message from one enrichment task.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentUpdate {
    pub generation: u64,
    pub index: usize,
    pub scores: ScorePercentages,
}

struct EnrichmentJob {
    index: usize,
    match_id: String,
}

pub struct CompanionSession {
    client: Gw2Client,
    link: Arc<dyn DeviceLink>,
    realms: RealmDirectory,
    matches: Vec<MatchSummary>,
    /// Index of the next summary to dispatch; wraps to 0 when read at
    /// or past the list length.
    cursor: usize,
    /// Bumped on every match-list replacement; tags in-flight
    /// enrichment so stale completions can be recognized.
    generation: u64,
    enrich_tx: mpsc::Sender<EnrichmentUpdate>,
}

impl CompanionSession {
    pub fn new(
        client: Gw2Client,
        link: Arc<dyn DeviceLink>,
    ) -> (Self, mpsc::Receiver<EnrichmentUpdate>) {
        let (enrich_tx, enrich_rx) = mpsc::channel(256);
        let session = CompanionSession {
            client,
            link,
            realms: RealmDirectory::new(),
            matches: Vec::new(),
            cursor: 0,
            generation: 0,
            enrich_tx,
        };
        (session, enrich_rx)
    }

    /// Main event loop: reacts to device lifecycle events and folds in
    /// enrichment completions as they arrive.
    pub async fn run(
        mut self,
        mut device_rx: mpsc::Receiver<DeviceEvent>,
        mut enrich_rx: mpsc::Receiver<EnrichmentUpdate>,
    ) {
        info!("Companion session started (link: {})", self.link.name());
        loop {
            tokio::select! {
                maybe_event = device_rx.recv() => match maybe_event {
                    Some(event) => self.on_device_event(event).await,
                    None => {
                        info!("Device bridge closed, stopping session");
                        break;
                    }
                },
                Some(update) = enrich_rx.recv() => self.apply_enrichment(update),
            }
        }
    }

    async fn on_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Ready => {
                info!("Device ready, refreshing match data");
                self.refresh().await;
            }
            DeviceEvent::AppMessage {
                update_mode: Some(UPDATE_MODE_REFRESH),
            } => {
                info!("Device requested full refresh");
                self.refresh().await;
            }
            DeviceEvent::AppMessage { .. } => self.dispatch_next().await,
        }
    }

    /// Full refresh: reload the realm directory, rebuild the match
    /// list, launch enrichment for every match. Any fetch failure logs
    /// and stops the chain, leaving the previous state in place.
    async fn refresh(&mut self) {
        let worlds = match self.client.fetch_world_names().await {
            Ok(worlds) => worlds,
            Err(e) => {
                warn!("World name refresh failed: {:#}", e);
                return;
            }
        };
        self.realms.replace_all(worlds);
        debug!("Realm directory reloaded: {} worlds", self.realms.len());

        let entries = match self.client.fetch_match_overview().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Match list refresh failed: {:#}", e);
                return;
            }
        };

        let jobs = self.rebuild_matches(entries);
        info!(
            "Match list rebuilt: {} matches (generation {})",
            self.matches.len(),
            self.generation
        );
        self.spawn_enrichments(jobs);
    }

    /// Replace the match list with freshly resolved summaries, in
    /// response order, and return the enrichment jobs to launch. The
    /// dispatch cursor survives the replacement; an out-of-range cursor
    /// is reset on the next dispatch read.
    fn rebuild_matches(&mut self, entries: Vec<MatchEntry>) -> Vec<EnrichmentJob> {
        self.generation += 1;
        self.matches = entries
            .iter()
            .map(|entry| MatchSummary {
                match_id: entry.match_id.clone(),
                red_realm: self.realms.resolve(entry.red_world_id).map(str::to_string),
                blue_realm: self.realms.resolve(entry.blue_world_id).map(str::to_string),
                green_realm: self.realms.resolve(entry.green_world_id).map(str::to_string),
                scores: None,
            })
            .collect();

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| EnrichmentJob {
                index,
                match_id: entry.match_id,
            })
            .collect()
    }

    /// Launch one independent score fetch per match. The tasks race
    /// freely and report through the enrichment channel; nothing awaits
    /// them and nothing cancels them on a later refresh.
    fn spawn_enrichments(&self, jobs: Vec<EnrichmentJob>) {
        for job in jobs {
            let client = self.client.clone();
            let tx = self.enrich_tx.clone();
            let generation = self.generation;
            tokio::spawn(async move {
                match client.fetch_match_scores(&job.match_id).await {
                    Ok(triple) => {
                        let update = EnrichmentUpdate {
                            generation,
                            index: job.index,
                            scores: triple.percentages(),
                        };
                        // Receiver gone means the session stopped.
                        let _ = tx.send(update).await;
                    }
                    Err(e) => warn!("Score fetch for match {} failed: {:#}", job.match_id, e),
                }
            });
        }
    }

    /// Fold one enrichment completion into the current list, unless it
    /// belongs to a list that has since been replaced.
    fn apply_enrichment(&mut self, update: EnrichmentUpdate) {
        if update.generation != self.generation {
            debug!(
                "Discarding enrichment for superseded generation {}",
                update.generation
            );
            return;
        }
        match self.matches.get_mut(update.index) {
            Some(summary) => {
                debug!(
                    "Match {} enriched: {}/{}/{}",
                    summary.match_id, update.scores.red, update.scores.blue, update.scores.green
                );
                summary.scores = Some(update.scores);
            }
            None => warn!("Enrichment index {} out of range", update.index),
        }
    }

    /// Send the summary under the cursor to the device. No-ops without
    /// a message when the list is empty or the entry is not yet
    /// enriched. The cursor advances only on confirmed delivery, so a
    /// failed send is retried by the device's next request.
    async fn dispatch_next(&mut self) {
        if self.cursor >= self.matches.len() {
            self.cursor = 0;
        }

        let summary = match self.matches.get(self.cursor) {
            Some(summary) => summary,
            None => {
                debug!("No matches loaded, nothing to dispatch");
                return;
            }
        };
        let scores = match summary.scores {
            Some(scores) => scores,
            None => {
                debug!("Match {} not yet enriched, skipping", summary.match_id);
                return;
            }
        };

        let frame = MatchFrame {
            red_name: summary.red_realm.clone(),
            red_score: scores.red,
            blue_name: summary.blue_realm.clone(),
            blue_score: scores.blue,
            green_name: summary.green_realm.clone(),
            green_score: scores.green,
            this_match: (self.cursor + 1) as u32,
            match_count: self.matches.len() as u32,
        };

        match self.link.send_frame(&frame).await {
            Ok(()) => {
                info!(
                    "Dispatched match {} ({}/{})",
                    summary.match_id,
                    self.cursor + 1,
                    self.matches.len()
                );
                self.cursor += 1;
            }
            Err(e) => warn!("Frame delivery failed, will retry on next request: {}", e),
        }
    }
}
