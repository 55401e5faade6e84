//! In-memory `EntityStore` used by tests across the workspace.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    ChangeType, EntityChange, EntityChangeStream, EntityChangeSubscription, EntityFilter,
    EntityKind, EntityPage, EntityPatch, EntityRecord, EntityStore, PageRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    Create,
    Update,
    Delete,
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpdate {
    pub kind: EntityKind,
    pub id: String,
    pub patch: EntityPatch,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<EntityKind, Vec<EntityRecord>>,
    planned_failures: HashMap<StoreOp, VecDeque<StoreError>>,
    update_calls: Vec<RecordedUpdate>,
    create_calls: Vec<EntityRecord>,
    subscribers: Vec<Subscriber>,
}

struct Subscriber {
    kind: EntityKind,
    filter: EntityFilter,
    sender: mpsc::UnboundedSender<EntityChange>,
}

#[derive(Default)]
pub struct InMemoryEntityStore {
    state: Mutex<StoreState>,
}

impl InMemoryEntityStore {
    pub fn seed(&self, record: EntityRecord) {
        let mut state = self.state.lock().expect("lock store state");
        state.records.entry(record.kind()).or_default().push(record);
    }

    pub fn seed_many(&self, records: impl IntoIterator<Item = EntityRecord>) {
        for record in records {
            self.seed(record);
        }
    }

    pub fn inject_failure(&self, op: StoreOp, error: StoreError) {
        let mut state = self.state.lock().expect("lock store state");
        state.planned_failures.entry(op).or_default().push_back(error);
    }

    pub fn update_calls(&self) -> Vec<RecordedUpdate> {
        let state = self.state.lock().expect("lock store state");
        state.update_calls.clone()
    }

    pub fn create_calls(&self) -> Vec<EntityRecord> {
        let state = self.state.lock().expect("lock store state");
        state.create_calls.clone()
    }

    pub fn record(&self, kind: EntityKind, id: &str) -> Option<EntityRecord> {
        let state = self.state.lock().expect("lock store state");
        state
            .records
            .get(&kind)
            .and_then(|records| records.iter().find(|record| record.id() == id))
            .cloned()
    }

    fn take_planned_failure(&self, op: StoreOp) -> Option<StoreError> {
        let mut state = self.state.lock().expect("lock store state");
        state
            .planned_failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
    }

    fn publish(&self, change: EntityChange) {
        let mut state = self.state.lock().expect("lock store state");
        state.subscribers.retain(|subscriber| {
            if subscriber.kind != change.record.kind() || !subscriber.filter.matches(&change.record)
            {
                return true;
            }
            subscriber.sender.send(change.clone()).is_ok()
        });
    }
}

fn parse_page_token(token: &str) -> StoreResult<usize> {
    token
        .parse::<usize>()
        .map_err(|_| StoreError::Fetch(format!("invalid page token: {token}")))
}

fn apply_patch(record: &mut EntityRecord, patch: EntityPatch) -> StoreResult<()> {
    match (record, patch) {
        (EntityRecord::Score(score), EntityPatch::Score(patch)) => {
            if let Some(champion_version_id) = patch.champion_version_id {
                score.champion_version_id = champion_version_id;
            }
            Ok(())
        }
        (EntityRecord::ScoreVersion(version), EntityPatch::ScoreVersion(patch)) => {
            if let Some(is_featured) = patch.is_featured {
                version.is_featured = is_featured;
            }
            if let Some(note) = patch.note {
                version.note = note;
            }
            Ok(())
        }
        (EntityRecord::Task(task), EntityPatch::Task(patch)) => {
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(stages) = patch.stages {
                task.stages = stages;
            }
            Ok(())
        }
        (record, patch) => Err(StoreError::Mutation(format!(
            "patch {patch:?} does not apply to {} record",
            record.kind()
        ))),
    }
}

struct InMemoryChangeSubscription {
    receiver: mpsc::UnboundedReceiver<EntityChange>,
}

#[async_trait]
impl EntityChangeSubscription for InMemoryChangeSubscription {
    async fn next_change(&mut self) -> StoreResult<Option<EntityChange>> {
        Ok(self.receiver.recv().await)
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn list(
        &self,
        kind: EntityKind,
        filter: EntityFilter,
        page: PageRequest,
    ) -> StoreResult<EntityPage> {
        if let Some(error) = self.take_planned_failure(StoreOp::List) {
            return Err(error);
        }

        let offset = match page.page_token.as_deref() {
            Some(token) => parse_page_token(token)?,
            None => 0,
        };
        let state = self.state.lock().expect("lock store state");
        let matching: Vec<EntityRecord> = state
            .records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let page_size = page.page_size.max(1);
        let records: Vec<EntityRecord> =
            matching.iter().skip(offset).take(page_size).cloned().collect();
        let next_offset = offset + records.len();
        let next_page_token = if next_offset < matching.len() {
            Some(next_offset.to_string())
        } else {
            None
        };

        Ok(EntityPage {
            records,
            next_page_token,
        })
    }

    async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Option<EntityRecord>> {
        if let Some(error) = self.take_planned_failure(StoreOp::Get) {
            return Err(error);
        }
        Ok(self.record(kind, id))
    }

    async fn create(&self, record: EntityRecord) -> StoreResult<EntityRecord> {
        {
            let mut state = self.state.lock().expect("lock store state");
            state.create_calls.push(record.clone());
        }
        if let Some(error) = self.take_planned_failure(StoreOp::Create) {
            return Err(error);
        }

        {
            let mut state = self.state.lock().expect("lock store state");
            let records = state.records.entry(record.kind()).or_default();
            if records.iter().any(|existing| existing.id() == record.id()) {
                return Err(StoreError::Mutation(format!(
                    "duplicate {} id: {}",
                    record.kind(),
                    record.id()
                )));
            }
            records.push(record.clone());
        }
        self.publish(EntityChange {
            change_type: ChangeType::Created,
            record: record.clone(),
        });
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: EntityPatch,
    ) -> StoreResult<EntityRecord> {
        {
            let mut state = self.state.lock().expect("lock store state");
            state.update_calls.push(RecordedUpdate {
                kind,
                id: id.to_owned(),
                patch: patch.clone(),
            });
        }
        if let Some(error) = self.take_planned_failure(StoreOp::Update) {
            return Err(error);
        }

        let updated = {
            let mut state = self.state.lock().expect("lock store state");
            let records = state
                .records
                .get_mut(&kind)
                .ok_or_else(|| StoreError::not_found(kind, id))?;
            let record = records
                .iter_mut()
                .find(|record| record.id() == id)
                .ok_or_else(|| StoreError::not_found(kind, id))?;
            apply_patch(record, patch)?;
            record.clone()
        };
        self.publish(EntityChange {
            change_type: ChangeType::Updated,
            record: updated.clone(),
        });
        Ok(updated)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
        if let Some(error) = self.take_planned_failure(StoreOp::Delete) {
            return Err(error);
        }

        let removed = {
            let mut state = self.state.lock().expect("lock store state");
            let records = state
                .records
                .get_mut(&kind)
                .ok_or_else(|| StoreError::not_found(kind, id))?;
            let index = records
                .iter()
                .position(|record| record.id() == id)
                .ok_or_else(|| StoreError::not_found(kind, id))?;
            records.remove(index)
        };
        self.publish(EntityChange {
            change_type: ChangeType::Deleted,
            record: removed,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        kind: EntityKind,
        filter: EntityFilter,
    ) -> StoreResult<EntityChangeStream> {
        if let Some(error) = self.take_planned_failure(StoreOp::Subscribe) {
            return Err(error);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().expect("lock store state");
        state.subscribers.push(Subscriber {
            kind,
            filter,
            sender,
        });
        Ok(Box::new(InMemoryChangeSubscription { receiver }))
    }
}
