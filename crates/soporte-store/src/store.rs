// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Id-keyed, insertion-ordered entity collections.
//!
//! Every mutation is a [`StoreAction`] applied through
//! [`EntityStore::apply`], so the merge policy lives in one place. The
//! shared [`StoreHandle`] serialises writers and bumps a revision counter
//! readers can watch to know when to re-render.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use soporte_core::{Collection, EntityId, SoporteError};
use strum::IntoEnumIterator;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use crate::entity::Entity;

/// Where a new entity lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    Front,
    #[default]
    Back,
}

/// An entity together with its position, captured before an optimistic
/// change so the change can be undone exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Positioned {
    pub index: usize,
    pub entity: Entity,
}

/// Typed mutation of the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    /// Full replacement of the record with the same id, or an insert.
    Upsert {
        collection: Collection,
        entity: Value,
        placement: Placement,
    },
    /// Shallow field merge into the record with the same id, or an insert.
    Patch {
        collection: Collection,
        entity: Value,
    },
    Remove {
        collection: Collection,
        id: EntityId,
    },
    /// Wholesale replacement of a collection.
    SetList {
        collection: Collection,
        entities: Vec<Value>,
    },
    /// Swaps a temporary record for the confirmed one.
    ReplaceId {
        collection: Collection,
        from: EntityId,
        entity: Value,
    },
    /// Puts back what [`EntityStore::capture`] saw; `None` removes the id.
    Restore {
        collection: Collection,
        id: EntityId,
        prior: Option<Positioned>,
    },
}

impl StoreAction {
    pub fn upsert(collection: Collection, entity: Value) -> Self {
        Self::Upsert {
            collection,
            entity,
            placement: Placement::Back,
        }
    }

    pub fn patch(collection: Collection, entity: Value) -> Self {
        Self::Patch { collection, entity }
    }

    pub fn remove(collection: Collection, id: EntityId) -> Self {
        Self::Remove { collection, id }
    }

    pub fn set_list(collection: Collection, entities: Vec<Value>) -> Self {
        Self::SetList {
            collection,
            entities,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Upsert { collection, .. }
            | Self::Patch { collection, .. }
            | Self::Remove { collection, .. }
            | Self::SetList { collection, .. }
            | Self::ReplaceId { collection, .. }
            | Self::Restore { collection, .. } => *collection,
        }
    }
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    Patched,
    Removed,
    /// The collection was replaced with this many entities.
    Listed(usize),
    /// Valid action that changed nothing (remove of an absent id, upsert
    /// of an identical record).
    Unchanged,
    /// Malformed input; the collection is untouched.
    Rejected(String),
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged | Self::Rejected(_))
    }
}

/// The client-side entity collections plus one detail slot per collection.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    lists: HashMap<Collection, Vec<Entity>>,
    details: HashMap<Collection, Entity>,
}

/// An empty collection equals one that was never written.
impl PartialEq for EntityStore {
    fn eq(&self, other: &Self) -> bool {
        self.details == other.details
            && Collection::iter().all(|c| self.list(c) == other.list(c))
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: StoreAction) -> ApplyOutcome {
        let collection = action.collection();
        let outcome = match action {
            StoreAction::Upsert {
                collection,
                entity,
                placement,
            } => match Entity::from_value(entity) {
                Ok(entity) => self.upsert_entity(collection, entity, placement),
                Err(err) => reject(err),
            },
            StoreAction::Patch { collection, entity } => match Entity::from_value(entity) {
                Ok(entity) => self.patch_entity(collection, entity),
                Err(err) => reject(err),
            },
            StoreAction::Remove { collection, id } => self.remove(collection, &id),
            StoreAction::SetList {
                collection,
                entities,
            } => self.set_list(collection, entities),
            StoreAction::ReplaceId {
                collection,
                from,
                entity,
            } => match Entity::from_value(entity) {
                Ok(entity) => self.replace_id(collection, &from, entity),
                Err(err) => reject(err),
            },
            StoreAction::Restore {
                collection,
                id,
                prior,
            } => self.restore(collection, &id, prior),
        };

        if let ApplyOutcome::Rejected(reason) = &outcome {
            warn!(collection = %collection, reason = %reason, "dropping malformed entity");
        }
        outcome
    }

    /// Validates and upserts a raw record at the back.
    pub fn upsert(&mut self, collection: Collection, entity: Value) -> ApplyOutcome {
        self.apply(StoreAction::upsert(collection, entity))
    }

    pub fn patch(&mut self, collection: Collection, entity: Value) -> ApplyOutcome {
        self.apply(StoreAction::patch(collection, entity))
    }

    /// Removes the record with `id`. Absent ids are a no-op.
    pub fn remove(&mut self, collection: Collection, id: &EntityId) -> ApplyOutcome {
        let Some(list) = self.lists.get_mut(&collection) else {
            return ApplyOutcome::Unchanged;
        };
        match list.iter().position(|e| e.id() == id) {
            Some(index) => {
                list.remove(index);
                ApplyOutcome::Removed
            }
            None => ApplyOutcome::Unchanged,
        }
    }

    /// Replaces the whole collection. Malformed records are dropped; ids
    /// are trusted to be unique.
    pub fn set_list(&mut self, collection: Collection, entities: Vec<Value>) -> ApplyOutcome {
        let mut list = Vec::with_capacity(entities.len());
        for raw in entities {
            match Entity::from_value(raw) {
                Ok(entity) => list.push(entity),
                Err(err) => warn!(collection = %collection, error = %err, "dropping malformed entity from list"),
            }
        }
        let count = list.len();
        self.lists.insert(collection, list);
        debug!(collection = %collection, count, "collection replaced");
        ApplyOutcome::Listed(count)
    }

    fn upsert_entity(
        &mut self,
        collection: Collection,
        entity: Entity,
        placement: Placement,
    ) -> ApplyOutcome {
        self.sync_detail(collection, &entity, false);
        let list = self.lists.entry(collection).or_default();
        match list.iter_mut().find(|e| e.id() == entity.id()) {
            Some(existing) if *existing == entity => ApplyOutcome::Unchanged,
            Some(existing) => {
                *existing = entity;
                ApplyOutcome::Replaced
            }
            None => {
                match placement {
                    Placement::Front => list.insert(0, entity),
                    Placement::Back => list.push(entity),
                }
                ApplyOutcome::Inserted
            }
        }
    }

    fn patch_entity(&mut self, collection: Collection, patch: Entity) -> ApplyOutcome {
        self.sync_detail(collection, &patch, true);
        let list = self.lists.entry(collection).or_default();
        match list.iter_mut().find(|e| e.id() == patch.id()) {
            Some(existing) => {
                let before = existing.clone();
                existing.merge(&patch);
                if *existing == before {
                    ApplyOutcome::Unchanged
                } else {
                    ApplyOutcome::Patched
                }
            }
            None => {
                list.push(patch);
                ApplyOutcome::Inserted
            }
        }
    }

    fn replace_id(&mut self, collection: Collection, from: &EntityId, entity: Entity) -> ApplyOutcome {
        let list = self.lists.entry(collection).or_default();
        let temp = list.iter().position(|e| e.id() == from);
        let real = list.iter().position(|e| e.id() == entity.id());
        match (temp, real) {
            // The confirmed record already arrived through another path: the
            // temporary one goes, the real one is refreshed where it sits.
            (Some(temp), Some(real)) if temp != real => {
                list[real] = entity;
                list.remove(temp);
                ApplyOutcome::Replaced
            }
            (Some(index), _) | (None, Some(index)) => {
                list[index] = entity;
                ApplyOutcome::Replaced
            }
            (None, None) => {
                list.push(entity);
                ApplyOutcome::Inserted
            }
        }
    }

    fn restore(
        &mut self,
        collection: Collection,
        id: &EntityId,
        prior: Option<Positioned>,
    ) -> ApplyOutcome {
        let list = self.lists.entry(collection).or_default();
        let current = list.iter().position(|e| e.id() == id);
        match (current, prior) {
            (None, None) => ApplyOutcome::Unchanged,
            (Some(index), None) => {
                list.remove(index);
                ApplyOutcome::Removed
            }
            (current, Some(Positioned { index, entity })) => {
                if let Some(current) = current {
                    list.remove(current);
                }
                let index = index.min(list.len());
                list.insert(index, entity);
                ApplyOutcome::Replaced
            }
        }
    }

    /// Keeps the detail slot in step with list writes for the same id.
    fn sync_detail(&mut self, collection: Collection, entity: &Entity, partial: bool) {
        if let Some(detail) = self.details.get_mut(&collection)
            && detail.id() == entity.id()
        {
            if partial {
                detail.merge(entity);
            } else {
                *detail = entity.clone();
            }
        }
    }

    /// Position and value of `id`, for a later [`StoreAction::Restore`].
    pub fn capture(&self, collection: Collection, id: &EntityId) -> Option<Positioned> {
        let list = self.lists.get(&collection)?;
        list.iter()
            .position(|e| e.id() == id)
            .map(|index| Positioned {
                index,
                entity: list[index].clone(),
            })
    }

    pub fn list(&self, collection: Collection) -> &[Entity] {
        self.lists
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, collection: Collection, id: &EntityId) -> Option<&Entity> {
        self.list(collection).iter().find(|e| e.id() == id)
    }

    pub fn ids(&self, collection: Collection) -> Vec<EntityId> {
        self.list(collection).iter().map(|e| e.id().clone()).collect()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.list(collection).len()
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.list(collection).is_empty()
    }

    /// The "currently viewed" record of a collection.
    pub fn get_detail(&self, collection: Collection) -> Option<&Entity> {
        self.details.get(&collection)
    }

    pub fn set_detail(&mut self, collection: Collection, entity: Value) -> Result<(), SoporteError> {
        let entity = Entity::from_value(entity)?;
        self.details.insert(collection, entity);
        Ok(())
    }

    pub fn clear_detail(&mut self, collection: Collection) {
        self.details.remove(&collection);
    }
}

fn reject(err: SoporteError) -> ApplyOutcome {
    ApplyOutcome::Rejected(err.to_string())
}

/// Shared, watchable handle to one [`EntityStore`].
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<EntityStore>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::from_store(EntityStore::new())
    }

    pub fn from_store(store: EntityStore) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(store)),
            revision: Arc::new(revision),
        }
    }

    /// Applies one action and bumps the revision if anything changed.
    pub async fn apply(&self, action: StoreAction) -> ApplyOutcome {
        let outcome = self.inner.write().await.apply(action);
        if outcome.changed() {
            self.revision.send_modify(|rev| *rev += 1);
        }
        outcome
    }

    /// Captures the prior state of `id` and applies `action` under one
    /// write lock, so no other writer can slip in between.
    pub async fn apply_captured(
        &self,
        collection: Collection,
        id: &EntityId,
        action: StoreAction,
    ) -> (Option<Positioned>, ApplyOutcome) {
        let mut store = self.inner.write().await;
        let prior = store.capture(collection, id);
        let outcome = store.apply(action);
        drop(store);
        if outcome.changed() {
            self.revision.send_modify(|rev| *rev += 1);
        }
        (prior, outcome)
    }

    pub async fn set_detail(&self, collection: Collection, entity: Value) -> Result<(), SoporteError> {
        self.inner.write().await.set_detail(collection, entity)?;
        self.revision.send_modify(|rev| *rev += 1);
        Ok(())
    }

    pub async fn clear_detail(&self, collection: Collection) {
        self.inner.write().await.clear_detail(collection);
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Runs `f` against a consistent view of the store.
    pub async fn read<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        f(&*self.inner.read().await)
    }

    /// Cloned contents of one collection.
    pub async fn list(&self, collection: Collection) -> Vec<Entity> {
        self.read(|store| store.list(collection).to_vec()).await
    }

    pub async fn get(&self, collection: Collection, id: &EntityId) -> Option<Entity> {
        self.read(|store| store.get(collection, id).cloned()).await
    }

    pub async fn detail(&self, collection: Collection) -> Option<Entity> {
        self.read(|store| store.get_detail(collection).cloned()).await
    }

    /// Full copy of the store, for comparisons in tests and diagnostics.
    pub async fn snapshot(&self) -> EntityStore {
        self.read(EntityStore::clone).await
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver that changes whenever the store does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
