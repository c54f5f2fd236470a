// Cross-window and relay object replication with ghost materialization.

use super::scene_store::{Placement, SceneObjectStore};
use super::types::{BusMessage, ObjectEvent, RelayOutbound};
use crate::domain::errors::SyncError;
use crate::domain::math::Vec3;
use crate::domain::object::{ObjectId, Origin, PropsPatch, SceneKey, SceneObject};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Outgoing replication traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEffect {
    Bus(BusMessage),
    Relay(RelayOutbound),
}

#[derive(Debug, Clone)]
enum PendingOp {
    Move(Vec3),
    Update(PropsPatch),
}

#[derive(Debug, Clone)]
struct Pending {
    key: SceneKey,
    op: PendingOp,
    ticks: u8,
}

pub struct ObjectSync {
    label: String,
    owned: BTreeSet<ObjectId>,
    known: HashMap<SceneKey, SceneObject>,
    merged_remote_groups: BTreeSet<String>,
    overlap: BTreeSet<String>,
    pending: Vec<Pending>,
    relay_code: Option<String>,
}

impl ObjectSync {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            owned: BTreeSet::new(),
            known: HashMap::new(),
            merged_remote_groups: BTreeSet::new(),
            overlap: BTreeSet::new(),
            pending: Vec::new(),
            relay_code: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_owned(&self, id: &ObjectId) -> bool {
        self.owned.contains(id)
    }

    pub fn owned_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.owned
            .iter()
            .filter_map(|id| self.known.get(&SceneKey::local(id.clone())))
    }

    pub fn known(&self, key: &SceneKey) -> Option<&SceneObject> {
        self.known.get(key)
    }

    pub fn merged_groups(&self) -> &BTreeSet<String> {
        &self.merged_remote_groups
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Join code to mirror owned objects to, while the relay is connected.
    pub fn set_relay_code(&mut self, code: Option<String>) {
        self.relay_code = code;
    }

    pub fn create(
        &mut self,
        object: SceneObject,
        store: &mut SceneObjectStore,
    ) -> Result<Vec<SyncEffect>, SyncError> {
        if object.owner_id != self.label {
            return Err(SyncError::NotOwner(object.id));
        }
        if self.owned.contains(&object.id) {
            return Err(SyncError::AlreadyExists(object.id));
        }
        store.insert_local(object.clone(), Placement::Free)?;
        self.owned.insert(object.id.clone());
        self.known
            .insert(SceneKey::local(object.id.clone()), object.clone());
        debug!(id = %object.id, kind = object.kind.name(), "object created");
        Ok(self.broadcast(ObjectEvent::Add { object }))
    }

    pub fn move_object(
        &mut self,
        id: &ObjectId,
        position: Vec3,
        store: &mut SceneObjectStore,
    ) -> Result<Vec<SyncEffect>, SyncError> {
        let key = self.owned_key(id)?;
        if let Some(object) = self.known.get_mut(&key) {
            object.position = position;
        }
        store.set_position(&key, position);
        Ok(self.broadcast(ObjectEvent::Move {
            id: id.clone(),
            position,
        }))
    }

    pub fn update(
        &mut self,
        id: &ObjectId,
        patch: PropsPatch,
        store: &mut SceneObjectStore,
    ) -> Result<Vec<SyncEffect>, SyncError> {
        let key = self.owned_key(id)?;
        let changed = self
            .known
            .get_mut(&key)
            .is_some_and(|object| patch.apply(&mut object.properties));
        store.apply_patch(&key, &patch);
        if !changed {
            return Ok(Vec::new());
        }
        Ok(self.broadcast(ObjectEvent::Update {
            id: id.clone(),
            properties: patch,
        }))
    }

    pub fn remove(
        &mut self,
        id: &ObjectId,
        store: &mut SceneObjectStore,
    ) -> Result<Vec<SyncEffect>, SyncError> {
        let key = self.owned_key(id)?;
        self.owned.remove(id);
        self.known.remove(&key);
        store.remove(&key);
        Ok(self.broadcast(ObjectEvent::Remove { id: id.clone() }))
    }

    /// Applies an object event from a peer window. The bus echoes our own
    /// publishes back to us; those are ignored.
    pub fn on_bus_event(
        &mut self,
        sender: &str,
        event: ObjectEvent,
        store: &mut SceneObjectStore,
    ) {
        if sender == self.label {
            return;
        }
        if let ObjectEvent::Add { object } = &event
            && object.owner_id != sender
        {
            warn!(sender, owner = %object.owner_id, id = %object.id, "peer sent an object it does not own");
            return;
        }
        self.apply_remote(Origin::Peer(sender.to_string()), event, store);
    }

    /// Applies an object event from a relay universe. Only merged codes count.
    pub fn on_relay_event(&mut self, code: &str, event: ObjectEvent, store: &mut SceneObjectStore) {
        if !self.merged_remote_groups.contains(code) {
            debug!(code, "dropping relay event from unmerged universe");
            return;
        }
        self.apply_remote(Origin::Relay(code.to_string()), event, store);
    }

    pub fn on_remote_create(&mut self, key: SceneKey, object: SceneObject, store: &mut SceneObjectStore) {
        if !key.is_ghost() {
            return;
        }
        self.known.insert(key.clone(), object.clone());
        if self.materializes(&key.origin) {
            store.upsert_ghost(key.clone(), object);
        }
        self.flush_pending(&key, store);
    }

    pub fn on_remote_move(&mut self, key: SceneKey, position: Vec3, store: &mut SceneObjectStore) {
        if !key.is_ghost() {
            return;
        }
        match self.known.get_mut(&key) {
            Some(object) => {
                object.position = position;
                store.blend_to(&key, position);
            }
            None => self.buffer(key, PendingOp::Move(position)),
        }
    }

    pub fn on_remote_update(&mut self, key: SceneKey, patch: PropsPatch, store: &mut SceneObjectStore) {
        if !key.is_ghost() {
            return;
        }
        match self.known.get_mut(&key) {
            Some(object) => {
                patch.apply(&mut object.properties);
                store.apply_patch(&key, &patch);
            }
            None => self.buffer(key, PendingOp::Update(patch)),
        }
    }

    pub fn on_remote_remove(&mut self, key: SceneKey, store: &mut SceneObjectStore) {
        if !key.is_ghost() {
            return;
        }
        self.pending.retain(|p| p.key != key);
        if self.known.remove(&key).is_some() {
            store.fade_out(&key);
        }
    }

    /// Reconciles peer ghosts with a new overlap set. Safe to call repeatedly
    /// with the same set.
    pub fn on_overlap_set_changed(&mut self, overlap: BTreeSet<String>, store: &mut SceneObjectStore) {
        self.overlap = overlap;
        for (key, object) in &self.known {
            let Origin::Peer(label) = &key.origin else {
                continue;
            };
            let visible = store
                .get(key)
                .is_some_and(|entry| !entry.is_fading_out());
            if self.overlap.contains(label) {
                if !visible {
                    store.upsert_ghost(key.clone(), object.clone());
                }
            } else if store.contains(key) {
                store.fade_out(key);
            }
        }
    }

    /// Re-broadcasts every owned object so a newcomer can build its ghosts.
    pub fn on_request_sync(&self) -> Vec<SyncEffect> {
        self.owned_objects()
            .map(|object| {
                SyncEffect::Bus(BusMessage::Object(ObjectEvent::Add {
                    object: object.clone(),
                }))
            })
            .collect()
    }

    /// Mirrors every owned object to the relay cache.
    pub fn republish_to_relay(&self) -> Vec<SyncEffect> {
        let Some(code) = &self.relay_code else {
            return Vec::new();
        };
        self.owned_objects()
            .map(|object| {
                SyncEffect::Relay(RelayOutbound::Object {
                    code: code.clone(),
                    event: ObjectEvent::Add {
                        object: object.clone(),
                    },
                })
            })
            .collect()
    }

    /// Adopts a relay universe's objects as ghosts.
    pub fn merge_group(&mut self, code: &str, objects: Vec<SceneObject>, store: &mut SceneObjectStore) {
        self.merged_remote_groups.insert(code.to_string());
        for object in objects {
            let key = SceneKey::relay(code, object.id.clone());
            self.on_remote_create(key, object, store);
        }
    }

    pub fn leave_group(&mut self, code: &str, store: &mut SceneObjectStore) {
        if !self.merged_remote_groups.remove(code) {
            return;
        }
        let origin = Origin::Relay(code.to_string());
        self.forget_origin(&origin, store);
    }

    /// Drops everything learned from a closed peer window.
    pub fn forget_peer(&mut self, label: &str, store: &mut SceneObjectStore) {
        let origin = Origin::Peer(label.to_string());
        self.forget_origin(&origin, store);
    }

    /// Ages buffered remote edits; anything that already waited a full tick
    /// without its create arriving is dropped.
    pub fn tick(&mut self) {
        self.pending.retain_mut(|p| {
            if p.ticks >= 1 {
                debug!(key = %p.key, "dropping edit for unknown object");
                return false;
            }
            p.ticks += 1;
            true
        });
    }

    fn apply_remote(&mut self, origin: Origin, event: ObjectEvent, store: &mut SceneObjectStore) {
        match event {
            ObjectEvent::Add { object } => {
                let key = SceneKey {
                    origin,
                    id: object.id.clone(),
                };
                self.on_remote_create(key, object, store);
            }
            ObjectEvent::Move { id, position } => {
                self.on_remote_move(SceneKey { origin, id }, position, store)
            }
            ObjectEvent::Update { id, properties } => {
                self.on_remote_update(SceneKey { origin, id }, properties, store)
            }
            ObjectEvent::Remove { id } => self.on_remote_remove(SceneKey { origin, id }, store),
        }
    }

    fn forget_origin(&mut self, origin: &Origin, store: &mut SceneObjectStore) {
        let keys: Vec<SceneKey> = self
            .known
            .keys()
            .filter(|k| &k.origin == origin)
            .cloned()
            .collect();
        for key in keys {
            self.known.remove(&key);
            store.fade_out(&key);
        }
        self.pending.retain(|p| &p.key.origin != origin);
    }

    fn materializes(&self, origin: &Origin) -> bool {
        match origin {
            Origin::Local => true,
            Origin::Peer(label) => self.overlap.contains(label),
            Origin::Relay(code) => self.merged_remote_groups.contains(code),
        }
    }

    fn owned_key(&self, id: &ObjectId) -> Result<SceneKey, SyncError> {
        if self.owned.contains(id) {
            return Ok(SceneKey::local(id.clone()));
        }
        let ghost_known = self.known.keys().any(|k| k.is_ghost() && &k.id == id);
        if ghost_known {
            warn!(%id, "rejecting edit of an object owned by another universe");
            Err(SyncError::NotOwner(id.clone()))
        } else {
            Err(SyncError::UnknownObject(id.clone()))
        }
    }

    fn buffer(&mut self, key: SceneKey, op: PendingOp) {
        debug!(%key, "buffering edit for unknown object");
        self.pending.push(Pending { key, op, ticks: 0 });
    }

    fn flush_pending(&mut self, key: &SceneKey, store: &mut SceneObjectStore) {
        let (ready, rest): (Vec<Pending>, Vec<Pending>) =
            self.pending.drain(..).partition(|p| &p.key == key);
        self.pending = rest;
        for pending in ready {
            match pending.op {
                PendingOp::Move(position) => self.on_remote_move(pending.key, position, store),
                PendingOp::Update(patch) => self.on_remote_update(pending.key, patch, store),
            }
        }
    }

    fn broadcast(&self, event: ObjectEvent) -> Vec<SyncEffect> {
        let mut effects = vec![SyncEffect::Bus(BusMessage::Object(event.clone()))];
        if let Some(code) = &self.relay_code {
            effects.push(SyncEffect::Relay(RelayOutbound::Object {
                code: code.clone(),
                event,
            }));
        }
        effects
    }
}
