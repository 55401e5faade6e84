use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use scoreboard_core::{
    list_all_pages, EntityFilter, EntityKind, EntityPatch, EntityRecord, EntityStore, Score,
    ScorePatch, ScoreVersion, ScoreVersionId, ScoreVersionPatch, StoreError, StoreResult,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

static VERSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChampionStatus {
    Designated(ScoreVersionId),
    /// Covers both "no versions yet" and the ambiguous multiple-versions
    /// case; never auto-resolved beyond the single-version adopt rule.
    NoChampion,
}

/// Surfaced, non-fatal record of a failed mutation after its optimistic
/// change was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationNotice {
    pub operation: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHistory {
    pub score: Score,
    /// Newest first.
    pub versions: Vec<ScoreVersion>,
    pub selected_version_id: Option<ScoreVersionId>,
    pub dirty: bool,
    pub draft_configuration: String,
    pub draft_note: Option<String>,
}

/// Manages the per-score version history: load + champion resolution,
/// dirty-tracked draft edits, append-only save, idempotent promote and
/// feature toggling. Every mutation applies optimistically and rolls back
/// with a surfaced notice when the backend call fails.
pub struct VersionManager {
    store: Arc<dyn EntityStore>,
    page_size: usize,
    history: Option<VersionHistory>,
    notice: Option<MutationNotice>,
}

impl VersionManager {
    pub fn new(store: Arc<dyn EntityStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size,
            history: None,
            notice: None,
        }
    }

    pub fn history(&self) -> Option<&VersionHistory> {
        self.history.as_ref()
    }

    pub fn notice(&self) -> Option<&MutationNotice> {
        self.notice.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.as_ref().is_some_and(|history| history.dirty)
    }

    pub fn champion_status(&self) -> ChampionStatus {
        match self
            .history
            .as_ref()
            .and_then(|history| history.score.champion_version_id.clone())
        {
            Some(version_id) => ChampionStatus::Designated(version_id),
            None => ChampionStatus::NoChampion,
        }
    }

    /// Drop the loaded history, e.g. when the score selection is cleared.
    pub fn reset(&mut self) {
        self.history = None;
        self.notice = None;
    }

    /// Fetch the score's versions, newest first, and resolve the champion.
    /// When no champion is designated and exactly one version exists, that
    /// sole version is adopted as champion (optimistically, with rollback).
    /// Two or more versions without a champion stay unresolved.
    pub async fn load(&mut self, score: Score) -> StoreResult<()> {
        let records = list_all_pages(
            self.store.as_ref(),
            EntityKind::ScoreVersion,
            EntityFilter::ScoreId(score.id.clone()),
            self.page_size,
        )
        .await?;

        let mut versions = Vec::with_capacity(records.len());
        for record in records {
            match record.into_score_version() {
                Ok(version) => versions.push(version),
                Err(error) => {
                    warn!(score_id = %score.id, %error, "dropping malformed version record");
                }
            }
        }
        versions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });

        let selected_version_id = score
            .champion_version_id
            .clone()
            .or_else(|| versions.first().map(|version| version.id.clone()));
        let draft_configuration = selected_version_id
            .as_ref()
            .and_then(|selected| versions.iter().find(|version| version.id == *selected))
            .map(|version| version.configuration.clone())
            .unwrap_or_default();

        self.history = Some(VersionHistory {
            score,
            versions,
            selected_version_id,
            dirty: false,
            draft_configuration,
            draft_note: None,
        });
        self.notice = None;

        self.adopt_sole_version_if_unclaimed().await;
        Ok(())
    }

    pub fn edit_configuration(&mut self, configuration: impl Into<String>) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        history.draft_configuration = configuration.into();
        history.dirty = true;
    }

    pub fn edit_note(&mut self, note: Option<String>) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        history.draft_note = note;
        history.dirty = true;
    }

    pub fn select_version(&mut self, version_id: Option<ScoreVersionId>) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        history.selected_version_id = version_id;
    }

    /// Create a brand-new version from the draft state. The history is
    /// append-only: an existing version is never rewritten. When this is
    /// the very first version for the score it is also promoted to
    /// champion.
    pub async fn save(&mut self) -> StoreResult<ScoreVersionId> {
        let history = self
            .history
            .as_mut()
            .ok_or_else(|| StoreError::Mutation("no score loaded for save".to_owned()))?;

        let is_first_version = history.versions.is_empty();
        let prior_selected = history.selected_version_id.clone();
        let prior_dirty = history.dirty;
        let prior_champion = history.score.champion_version_id.clone();

        let now = now_timestamp();
        let version = ScoreVersion {
            id: next_version_id(),
            score_id: history.score.id.clone(),
            configuration: history.draft_configuration.clone(),
            is_featured: false,
            note: history.draft_note.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        let version_id = version.id.clone();

        history.versions.insert(0, version.clone());
        history.selected_version_id = Some(version_id.clone());
        history.dirty = false;
        if is_first_version {
            history.score.champion_version_id = Some(version_id.clone());
        }

        if let Err(error) = self
            .store
            .create(EntityRecord::ScoreVersion(version))
            .await
        {
            let history = self.history.as_mut().expect("history loaded");
            history.versions.remove(0);
            history.selected_version_id = prior_selected;
            history.dirty = prior_dirty;
            history.score.champion_version_id = prior_champion;
            warn!(%error, "rolled back unsaved version after create failure");
            self.notice = Some(MutationNotice {
                operation: "save",
                message: error.to_string(),
            });
            return Err(error);
        }

        if is_first_version {
            let score_id = {
                let history = self.history.as_ref().expect("history loaded");
                history.score.id.clone()
            };
            if let Err(error) = self
                .store
                .update(
                    EntityKind::Score,
                    score_id.as_str(),
                    EntityPatch::Score(ScorePatch {
                        champion_version_id: Some(Some(version_id.clone())),
                    }),
                )
                .await
            {
                let history = self.history.as_mut().expect("history loaded");
                history.score.champion_version_id = prior_champion;
                warn!(%error, "rolled back champion designation after update failure");
                self.notice = Some(MutationNotice {
                    operation: "save",
                    message: error.to_string(),
                });
                return Err(error);
            }
        }

        self.notice = None;
        Ok(version_id)
    }

    /// Designate an existing version as champion. Promoting the current
    /// champion is a no-op and issues no backend call.
    pub async fn promote(&mut self, version_id: &ScoreVersionId) -> StoreResult<()> {
        let history = self
            .history
            .as_mut()
            .ok_or_else(|| StoreError::Mutation("no score loaded for promote".to_owned()))?;

        if !history
            .versions
            .iter()
            .any(|version| version.id == *version_id)
        {
            return Err(StoreError::not_found(
                EntityKind::ScoreVersion,
                version_id.as_str(),
            ));
        }
        if history.score.champion_version_id.as_ref() == Some(version_id) {
            return Ok(());
        }

        let prior_champion = history.score.champion_version_id.clone();
        history.score.champion_version_id = Some(version_id.clone());
        let score_id = history.score.id.clone();

        if let Err(error) = self
            .store
            .update(
                EntityKind::Score,
                score_id.as_str(),
                EntityPatch::Score(ScorePatch {
                    champion_version_id: Some(Some(version_id.clone())),
                }),
            )
            .await
        {
            let history = self.history.as_mut().expect("history loaded");
            history.score.champion_version_id = prior_champion;
            warn!(%error, version_id = %version_id, "rolled back champion promotion");
            self.notice = Some(MutationNotice {
                operation: "promote",
                message: error.to_string(),
            });
            return Err(error);
        }

        self.notice = None;
        Ok(())
    }

    /// Flip a version's featured flag. Featured carries no exclusivity:
    /// any number of versions may be featured at once.
    pub async fn toggle_featured(&mut self, version_id: &ScoreVersionId) -> StoreResult<bool> {
        let history = self
            .history
            .as_mut()
            .ok_or_else(|| StoreError::Mutation("no score loaded for toggle".to_owned()))?;

        let version = history
            .versions
            .iter_mut()
            .find(|version| version.id == *version_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::ScoreVersion, version_id.as_str()))?;

        let next_featured = !version.is_featured;
        version.is_featured = next_featured;

        if let Err(error) = self
            .store
            .update(
                EntityKind::ScoreVersion,
                version_id.as_str(),
                EntityPatch::ScoreVersion(ScoreVersionPatch {
                    is_featured: Some(next_featured),
                    note: None,
                }),
            )
            .await
        {
            let history = self.history.as_mut().expect("history loaded");
            if let Some(version) = history
                .versions
                .iter_mut()
                .find(|version| version.id == *version_id)
            {
                version.is_featured = !next_featured;
            }
            warn!(%error, version_id = %version_id, "rolled back featured toggle");
            self.notice = Some(MutationNotice {
                operation: "toggle-feature",
                message: error.to_string(),
            });
            return Err(error);
        }

        self.notice = None;
        Ok(next_featured)
    }

    /// The single-version adopt rule: fires only when no champion is
    /// designated and exactly one version exists in total. Failure rolls
    /// the adoption back and surfaces a notice; the load itself stands.
    async fn adopt_sole_version_if_unclaimed(&mut self) {
        let (score_id, version_id) = {
            let Some(history) = self.history.as_ref() else {
                return;
            };
            if history.score.champion_version_id.is_some() || history.versions.len() != 1 {
                return;
            }
            (history.score.id.clone(), history.versions[0].id.clone())
        };

        {
            let history = self.history.as_mut().expect("history loaded");
            history.score.champion_version_id = Some(version_id.clone());
        }

        if let Err(error) = self
            .store
            .update(
                EntityKind::Score,
                score_id.as_str(),
                EntityPatch::Score(ScorePatch {
                    champion_version_id: Some(Some(version_id.clone())),
                }),
            )
            .await
        {
            let history = self.history.as_mut().expect("history loaded");
            history.score.champion_version_id = None;
            warn!(%error, version_id = %version_id, "rolled back champion auto-adopt");
            self.notice = Some(MutationNotice {
                operation: "auto-adopt-champion",
                message: error.to_string(),
            });
        }
    }
}

fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_owned())
}

fn next_version_id() -> ScoreVersionId {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let count = VERSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    ScoreVersionId::new(format!("sv-{now}-{count}"))
}
