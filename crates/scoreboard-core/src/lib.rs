//! Shared entity model and store boundary for the scoreboard dashboard core.

pub mod entities;
pub mod error;
pub mod ids;
pub mod store;
pub mod test_support;

pub use entities::{
    EvalItem, Score, ScoreVersion, Scorecard, Section, TaskRecord, TaskStage, TaskStatus,
};
pub use error::{StoreError, StoreResult};
pub use ids::{EvalItemId, ScoreId, ScoreVersionId, ScorecardId, SectionId, TaskId};
pub use store::{
    list_all_pages, ChangeType, EntityChange, EntityChangeStream, EntityChangeSubscription,
    EntityFilter, EntityKind, EntityPage, EntityPatch, EntityRecord, EntityStore, PageRequest,
    ScorePatch, ScoreVersionPatch, TaskPatch,
};
