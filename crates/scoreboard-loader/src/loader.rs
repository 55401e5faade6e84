use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scoreboard_core::{
    list_all_pages, EntityFilter, EntityKind, EntityStore, Score, ScorecardId, Section, SectionId,
    StoreResult,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{Generation, ScorecardLoadEvent};

pub const DEFAULT_SECTION_BATCH_SIZE: usize = 3;
pub const DEFAULT_SECTION_BATCH_DELAY: Duration = Duration::from_millis(25);
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressiveLoaderConfig {
    pub section_batch_size: usize,
    pub section_batch_delay: Duration,
    pub page_size: usize,
}

impl Default for ProgressiveLoaderConfig {
    fn default() -> Self {
        Self {
            section_batch_size: DEFAULT_SECTION_BATCH_SIZE,
            section_batch_delay: DEFAULT_SECTION_BATCH_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Fetches a scorecard's sections and per-section scores in bounded
/// batches, publishing partial results as they arrive. Every publish is
/// guarded by the shared generation counter; results for an abandoned
/// selection are dropped silently.
pub struct ProgressiveLoader {
    store: Arc<dyn EntityStore>,
    current_generation: Arc<AtomicU64>,
    events: mpsc::Sender<ScorecardLoadEvent>,
    config: ProgressiveLoaderConfig,
}

impl ProgressiveLoader {
    pub fn new(
        store: Arc<dyn EntityStore>,
        current_generation: Arc<AtomicU64>,
        events: mpsc::Sender<ScorecardLoadEvent>,
        config: ProgressiveLoaderConfig,
    ) -> Self {
        Self {
            store,
            current_generation,
            events,
            config,
        }
    }

    pub fn spawn_load(&self, scorecard_id: ScorecardId, generation: Generation) -> JoinHandle<()> {
        let run = LoadRun {
            store: Arc::clone(&self.store),
            current_generation: Arc::clone(&self.current_generation),
            events: self.events.clone(),
            config: self.config.clone(),
            scorecard_id,
            generation,
        };
        tokio::spawn(run.execute())
    }
}

struct LoadRun {
    store: Arc<dyn EntityStore>,
    current_generation: Arc<AtomicU64>,
    events: mpsc::Sender<ScorecardLoadEvent>,
    config: ProgressiveLoaderConfig,
    scorecard_id: ScorecardId,
    generation: Generation,
}

impl LoadRun {
    async fn execute(self) {
        let sections = match self.fetch_sections().await {
            Ok(sections) => sections,
            Err(error) => {
                warn!(
                    scorecard_id = %self.scorecard_id,
                    %error,
                    "scorecard sections fetch failed"
                );
                let _ = self
                    .publish(ScorecardLoadEvent::LoadFailed {
                        generation: self.generation,
                        scorecard_id: self.scorecard_id.clone(),
                        error: error.to_string(),
                    })
                    .await;
                return;
            }
        };

        if !self
            .publish(ScorecardLoadEvent::SectionsLoaded {
                generation: self.generation,
                scorecard_id: self.scorecard_id.clone(),
                sections: sections.clone(),
            })
            .await
        {
            return;
        }

        let batch_size = self.config.section_batch_size.max(1);
        for (batch_index, batch) in sections.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.config.section_batch_delay.is_zero() {
                tokio::time::sleep(self.config.section_batch_delay).await;
            }
            if self.is_stale() {
                debug!(
                    scorecard_id = %self.scorecard_id,
                    generation = self.generation,
                    "abandoning stale scorecard load"
                );
                return;
            }

            let fetches: Vec<(SectionId, JoinHandle<StoreResult<Vec<Score>>>)> = batch
                .iter()
                .map(|section| {
                    let store = Arc::clone(&self.store);
                    let section_id = section.id.clone();
                    let page_size = self.config.page_size;
                    let fetch_section_id = section_id.clone();
                    (
                        section_id,
                        tokio::spawn(async move {
                            fetch_section_scores(store.as_ref(), fetch_section_id, page_size).await
                        }),
                    )
                })
                .collect();

            for (section_id, fetch) in fetches {
                let event = match fetch.await {
                    Ok(Ok(scores)) => ScorecardLoadEvent::SectionScoresLoaded {
                        generation: self.generation,
                        scorecard_id: self.scorecard_id.clone(),
                        section_id,
                        scores,
                    },
                    Ok(Err(error)) => {
                        warn!(
                            scorecard_id = %self.scorecard_id,
                            section_id = %section_id,
                            %error,
                            "section scores fetch failed"
                        );
                        ScorecardLoadEvent::SectionScoresFailed {
                            generation: self.generation,
                            scorecard_id: self.scorecard_id.clone(),
                            section_id,
                            error: error.to_string(),
                        }
                    }
                    Err(join_error) => ScorecardLoadEvent::SectionScoresFailed {
                        generation: self.generation,
                        scorecard_id: self.scorecard_id.clone(),
                        section_id,
                        error: format!("section fetch task failed: {join_error}"),
                    },
                };
                if !self.publish(event).await {
                    return;
                }
            }
        }

        let _ = self
            .publish(ScorecardLoadEvent::LoadFinished {
                generation: self.generation,
                scorecard_id: self.scorecard_id.clone(),
            })
            .await;
    }

    async fn fetch_sections(&self) -> StoreResult<Vec<Section>> {
        let records = list_all_pages(
            self.store.as_ref(),
            EntityKind::Section,
            EntityFilter::ScorecardId(self.scorecard_id.clone()),
            self.config.page_size,
        )
        .await?;

        let mut sections = Vec::with_capacity(records.len());
        for record in records {
            match record.into_section() {
                Ok(section) => sections.push(section),
                Err(error) => {
                    warn!(scorecard_id = %self.scorecard_id, %error, "dropping malformed section record");
                }
            }
        }
        sections.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        Ok(sections)
    }

    fn is_stale(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) != self.generation
    }

    /// Publish unless the selection has moved on. Returns false when the
    /// run should stop (stale generation or closed channel).
    async fn publish(&self, event: ScorecardLoadEvent) -> bool {
        if self.is_stale() {
            debug!(
                scorecard_id = %self.scorecard_id,
                generation = self.generation,
                "discarding stale load event"
            );
            return false;
        }
        self.events.send(event).await.is_ok()
    }
}

async fn fetch_section_scores(
    store: &dyn EntityStore,
    section_id: SectionId,
    page_size: usize,
) -> StoreResult<Vec<Score>> {
    let records = list_all_pages(
        store,
        EntityKind::Score,
        EntityFilter::SectionId(section_id.clone()),
        page_size,
    )
    .await?;

    let mut scores = Vec::with_capacity(records.len());
    for record in records {
        match record.into_score() {
            Ok(score) => scores.push(score),
            Err(error) => {
                warn!(section_id = %section_id, %error, "dropping malformed score record");
            }
        }
    }
    scores.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.as_str().cmp(b.id.as_str())));
    Ok(scores)
}
