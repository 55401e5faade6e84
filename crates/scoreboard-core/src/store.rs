use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::{EvalItem, Score, ScoreVersion, Scorecard, Section, TaskRecord, TaskStage, TaskStatus};
use crate::error::{StoreError, StoreResult};
use crate::ids::{ScoreId, ScoreVersionId, ScorecardId, SectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Scorecard,
    Section,
    Score,
    ScoreVersion,
    EvalItem,
    Task,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scorecard => "scorecard",
            Self::Section => "section",
            Self::Score => "score",
            Self::ScoreVersion => "score version",
            Self::EvalItem => "eval item",
            Self::Task => "task",
        };
        f.write_str(name)
    }
}

/// Field-equality filter applied by `EntityStore::list` and `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntityFilter {
    #[default]
    All,
    ScorecardId(ScorecardId),
    SectionId(SectionId),
    ScoreId(ScoreId),
}

impl EntityFilter {
    pub fn matches(&self, record: &EntityRecord) -> bool {
        match self {
            Self::All => true,
            Self::ScorecardId(scorecard_id) => match record {
                EntityRecord::Section(section) => section.scorecard_id == *scorecard_id,
                EntityRecord::Score(score) => score.scorecard_id == *scorecard_id,
                EntityRecord::Scorecard(scorecard) => scorecard.id == *scorecard_id,
                _ => false,
            },
            Self::SectionId(section_id) => match record {
                EntityRecord::Score(score) => score.section_id == *section_id,
                EntityRecord::Section(section) => section.id == *section_id,
                _ => false,
            },
            Self::ScoreId(score_id) => match record {
                EntityRecord::ScoreVersion(version) => version.score_id == *score_id,
                EntityRecord::Score(score) => score.id == *score_id,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: usize,
    pub page_token: Option<String>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            page_token: None,
        }
    }

    pub fn next(page_size: usize, page_token: String) -> Self {
        Self {
            page_size,
            page_token: Some(page_token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPage {
    pub records: Vec<EntityRecord>,
    pub next_page_token: Option<String>,
}

/// Tagged wire shape at the store boundary. Loose backend responses are
/// normalized into this enum before anything inward sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record")]
pub enum EntityRecord {
    Scorecard(Scorecard),
    Section(Section),
    Score(Score),
    ScoreVersion(ScoreVersion),
    EvalItem(EvalItem),
    Task(TaskRecord),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Scorecard(_) => EntityKind::Scorecard,
            Self::Section(_) => EntityKind::Section,
            Self::Score(_) => EntityKind::Score,
            Self::ScoreVersion(_) => EntityKind::ScoreVersion,
            Self::EvalItem(_) => EntityKind::EvalItem,
            Self::Task(_) => EntityKind::Task,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Scorecard(scorecard) => scorecard.id.as_str(),
            Self::Section(section) => section.id.as_str(),
            Self::Score(score) => score.id.as_str(),
            Self::ScoreVersion(version) => version.id.as_str(),
            Self::EvalItem(item) => item.id.as_str(),
            Self::Task(task) => task.id.as_str(),
        }
    }

    /// Normalize a loose backend value into a typed record, rejecting
    /// malformed shapes at the boundary.
    pub fn from_json(kind: EntityKind, value: serde_json::Value) -> StoreResult<Self> {
        fn parse<T: serde::de::DeserializeOwned>(
            kind: EntityKind,
            value: serde_json::Value,
        ) -> StoreResult<T> {
            serde_json::from_value(value)
                .map_err(|error| StoreError::malformed(kind, error.to_string()))
        }

        let record = match kind {
            EntityKind::Scorecard => Self::Scorecard(parse(kind, value)?),
            EntityKind::Section => Self::Section(parse(kind, value)?),
            EntityKind::Score => Self::Score(parse(kind, value)?),
            EntityKind::ScoreVersion => Self::ScoreVersion(parse(kind, value)?),
            EntityKind::EvalItem => Self::EvalItem(parse(kind, value)?),
            EntityKind::Task => Self::Task(parse(kind, value)?),
        };
        if record.id().trim().is_empty() {
            return Err(StoreError::malformed(kind, "record id is empty"));
        }
        Ok(record)
    }

    pub fn into_section(self) -> StoreResult<Section> {
        match self {
            Self::Section(section) => Ok(section),
            other => Err(StoreError::malformed(
                EntityKind::Section,
                format!("expected section record, got {}", other.kind()),
            )),
        }
    }

    pub fn into_score(self) -> StoreResult<Score> {
        match self {
            Self::Score(score) => Ok(score),
            other => Err(StoreError::malformed(
                EntityKind::Score,
                format!("expected score record, got {}", other.kind()),
            )),
        }
    }

    pub fn into_score_version(self) -> StoreResult<ScoreVersion> {
        match self {
            Self::ScoreVersion(version) => Ok(version),
            other => Err(StoreError::malformed(
                EntityKind::ScoreVersion,
                format!("expected score version record, got {}", other.kind()),
            )),
        }
    }

    pub fn into_task(self) -> StoreResult<TaskRecord> {
        match self {
            Self::Task(task) => Ok(task),
            other => Err(StoreError::malformed(
                EntityKind::Task,
                format!("expected task record, got {}", other.kind()),
            )),
        }
    }
}

/// Partial update shapes. `ScoreVersionPatch` carries no `configuration`
/// field: a stored version's configuration cannot be patched through this
/// boundary, only replaced by creating a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPatch {
    Score(ScorePatch),
    ScoreVersion(ScoreVersionPatch),
    Task(TaskPatch),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScorePatch {
    /// `Some(None)` clears the champion designation.
    pub champion_version_id: Option<Option<ScoreVersionId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScoreVersionPatch {
    pub is_featured: Option<bool>,
    pub note: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub stages: Option<Vec<TaskStage>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityChange {
    pub change_type: ChangeType,
    pub record: EntityRecord,
}

#[async_trait]
pub trait EntityChangeSubscription: Send {
    async fn next_change(&mut self) -> StoreResult<Option<EntityChange>>;
}

pub type EntityChangeStream = Box<dyn EntityChangeSubscription>;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list(
        &self,
        kind: EntityKind,
        filter: EntityFilter,
        page: PageRequest,
    ) -> StoreResult<EntityPage>;

    async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Option<EntityRecord>>;

    async fn create(&self, record: EntityRecord) -> StoreResult<EntityRecord>;

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: EntityPatch,
    ) -> StoreResult<EntityRecord>;

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()>;

    async fn subscribe(
        &self,
        kind: EntityKind,
        filter: EntityFilter,
    ) -> StoreResult<EntityChangeStream>;
}

/// Repeats `list` calls until the store stops returning a page token.
pub async fn list_all_pages(
    store: &dyn EntityStore,
    kind: EntityKind,
    filter: EntityFilter,
    page_size: usize,
) -> StoreResult<Vec<EntityRecord>> {
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let request = match page_token.take() {
            Some(token) => PageRequest::next(page_size, token),
            None => PageRequest::first(page_size),
        };
        let page = store.list(kind, filter.clone(), request).await?;
        records.extend(page.records);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(records),
        }
    }
}
