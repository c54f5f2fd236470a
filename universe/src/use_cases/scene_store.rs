// Live objects of one universe, keyed by origin-qualified ids.

use crate::domain::errors::SyncError;
use crate::domain::geometry::{GeometryCatalog, ShapeDescriptor};
use crate::domain::math::Vec3;
use crate::domain::object::{PropsPatch, Rgb, SceneKey, SceneObject};
use crate::domain::quality::{Lighting, QualitySettings};
use crate::domain::tuning::SyncTuning;
use std::collections::HashMap;

/// What the renderer needs to build a material for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSpec {
    pub color: Rgb,
    pub opacity: f32,
    pub transparent: bool,
    pub lighting: Lighting,
    pub emissive: bool,
    pub casts_shadow: bool,
    /// Bumped on every quality switch so stale GPU materials can be detected.
    pub generation: u64,
}

/// Whether pointer drags may move an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// User-authored object, draggable by its owner.
    Free,
    /// Level geometry and the avatar.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    Visible,
    In { elapsed: f32 },
    Out { elapsed: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Blend {
    from: Vec3,
    to: Vec3,
    elapsed: f32,
}

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub object: SceneObject,
    pub shape: ShapeDescriptor,
    pub material: MaterialSpec,
    pub placement: Placement,
    fade: Fade,
    blend: Option<Blend>,
}

impl StoreEntry {
    pub fn is_fading_out(&self) -> bool {
        matches!(self.fade, Fade::Out { .. })
    }

    /// True while a remote move is still being blended in.
    pub fn is_blending(&self) -> bool {
        self.blend.is_some()
    }
}

pub struct SceneObjectStore {
    entries: HashMap<SceneKey, StoreEntry>,
    quality: QualitySettings,
    tuning: SyncTuning,
    generation: u64,
}

impl SceneObjectStore {
    pub fn new(quality: QualitySettings, tuning: SyncTuning) -> Self {
        Self {
            entries: HashMap::new(),
            quality,
            tuning,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &SceneKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &SceneKey) -> Option<&StoreEntry> {
        self.entries.get(key)
    }

    pub fn object(&self, key: &SceneKey) -> Option<&SceneObject> {
        self.entries.get(key).map(|e| &e.object)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneKey, &StoreEntry)> {
        self.entries.iter()
    }

    pub fn ghost_count(&self) -> usize {
        self.entries.keys().filter(|k| k.is_ghost()).count()
    }

    pub fn quality(&self) -> QualitySettings {
        self.quality
    }

    /// Inserts an object authored in this window.
    pub fn insert_local(
        &mut self,
        object: SceneObject,
        placement: Placement,
    ) -> Result<&StoreEntry, SyncError> {
        let key = SceneKey::local(object.id.clone());
        if self.entries.contains_key(&key) {
            return Err(SyncError::AlreadyExists(object.id));
        }
        let entry = self.build_entry(&key, object, placement, Fade::Visible);
        Ok(self.entries.entry(key).or_insert(entry))
    }

    /// Inserts or refreshes a ghost. A ghost that is fading out is revived in
    /// place; a visible ghost only has its object data replaced.
    /// Returns true when a new entry was created.
    pub fn upsert_ghost(&mut self, key: SceneKey, object: SceneObject) -> bool {
        debug_assert!(key.is_ghost());
        let ghost_opacity = self.tuning.ghost_opacity;
        let fade_seconds = self.tuning.fade_seconds;
        if let Some(entry) = self.entries.get_mut(&key) {
            if let Fade::Out { elapsed } = entry.fade {
                // Resume fading in from the current opacity.
                entry.fade = Fade::In {
                    elapsed: (fade_seconds - elapsed).max(0.0),
                };
            }
            let kind_changed = entry.object.kind != object.kind;
            entry.object = object;
            if kind_changed {
                entry.shape = GeometryCatalog::shape(entry.object.kind);
            }
            entry.blend = None;
            entry.material.color = entry.object.properties.color;
            entry.material.opacity = opacity_of(entry.fade, ghost_opacity, fade_seconds);
            return false;
        }

        let entry = self.build_entry(&key, object, Placement::Fixed, Fade::In { elapsed: 0.0 });
        self.entries.insert(key, entry);
        true
    }

    /// Starts the fade-out of a ghost; it is dropped once fully transparent.
    /// Local entries are removed immediately.
    pub fn fade_out(&mut self, key: &SceneKey) {
        if !key.is_ghost() {
            self.entries.remove(key);
            return;
        }
        let fade_seconds = self.tuning.fade_seconds;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.fade = match entry.fade {
                Fade::Out { elapsed } => Fade::Out { elapsed },
                Fade::In { elapsed } => Fade::Out {
                    elapsed: (fade_seconds - elapsed).max(0.0),
                },
                Fade::Visible => Fade::Out { elapsed: 0.0 },
            };
        }
    }

    pub fn remove(&mut self, key: &SceneKey) -> Option<SceneObject> {
        self.entries.remove(key).map(|e| e.object)
    }

    /// Removes every entry matching `pred`, returning the removed keys.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&SceneKey, &StoreEntry) -> bool) -> Vec<SceneKey> {
        let keys: Vec<SceneKey> = self
            .entries
            .iter()
            .filter(|(k, e)| pred(k, e))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        keys
    }

    /// Snaps an entry to `position`. Used for locally authored moves.
    pub fn set_position(&mut self, key: &SceneKey, position: Vec3) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.object.position = position;
                entry.blend = None;
                true
            }
            None => false,
        }
    }

    /// Starts a linear blend from the current position toward `target`.
    pub fn blend_to(&mut self, key: &SceneKey, target: Vec3) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.blend = Some(Blend {
                    from: entry.object.position,
                    to: target,
                    elapsed: 0.0,
                });
                true
            }
            None => false,
        }
    }

    /// Merges a property patch; returns true when the entry changed.
    pub fn apply_patch(&mut self, key: &SceneKey, patch: &PropsPatch) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if !patch.apply(&mut entry.object.properties) {
            return false;
        }
        entry.material.color = entry.object.properties.color;
        true
    }

    /// Advances fades and move blends by `dt` seconds. Returns the ghosts that
    /// finished fading out and were dropped.
    pub fn advance(&mut self, dt: f32) -> Vec<SceneKey> {
        let fade_seconds = self.tuning.fade_seconds;
        let ghost_opacity = self.tuning.ghost_opacity;
        let smoothing = self.tuning.smoothing_seconds;
        let mut finished = Vec::new();

        for (key, entry) in self.entries.iter_mut() {
            entry.fade = match entry.fade {
                Fade::Visible => Fade::Visible,
                Fade::In { elapsed } if elapsed + dt >= fade_seconds => Fade::Visible,
                Fade::In { elapsed } => Fade::In {
                    elapsed: elapsed + dt,
                },
                Fade::Out { elapsed } => {
                    if elapsed + dt >= fade_seconds {
                        finished.push(key.clone());
                    }
                    Fade::Out {
                        elapsed: elapsed + dt,
                    }
                }
            };
            if key.is_ghost() {
                entry.material.opacity = opacity_of(entry.fade, ghost_opacity, fade_seconds);
            }

            if let Some(mut blend) = entry.blend {
                blend.elapsed += dt;
                let t = if smoothing <= 0.0 {
                    1.0
                } else {
                    (blend.elapsed / smoothing).min(1.0)
                };
                entry.object.position = blend.from.lerp(blend.to, t);
                entry.blend = (t < 1.0).then_some(blend);
            }
        }

        for key in &finished {
            self.entries.remove(key);
        }
        finished
    }

    /// Applies a quality preset and rebuilds every material. Transforms and
    /// ids are untouched.
    pub fn set_quality(&mut self, quality: QualitySettings) {
        self.quality = quality;
        self.generation += 1;
        let ghost_opacity = self.tuning.ghost_opacity;
        let fade_seconds = self.tuning.fade_seconds;
        let generation = self.generation;
        for (key, entry) in self.entries.iter_mut() {
            let opacity = if key.is_ghost() {
                opacity_of(entry.fade, ghost_opacity, fade_seconds)
            } else {
                1.0
            };
            entry.material = material_for(key, &entry.object, &entry.shape, &quality, opacity, generation);
        }
    }

    fn build_entry(
        &self,
        key: &SceneKey,
        object: SceneObject,
        placement: Placement,
        fade: Fade,
    ) -> StoreEntry {
        let shape = GeometryCatalog::shape(object.kind);
        let opacity = if key.is_ghost() {
            opacity_of(fade, self.tuning.ghost_opacity, self.tuning.fade_seconds)
        } else {
            1.0
        };
        let material = material_for(key, &object, &shape, &self.quality, opacity, self.generation);
        StoreEntry {
            object,
            shape,
            material,
            placement,
            fade,
            blend: None,
        }
    }
}

fn opacity_of(fade: Fade, ghost_opacity: f32, fade_seconds: f32) -> f32 {
    let progress = |elapsed: f32| {
        if fade_seconds <= 0.0 {
            1.0
        } else {
            (elapsed / fade_seconds).clamp(0.0, 1.0)
        }
    };
    match fade {
        Fade::Visible => ghost_opacity,
        Fade::In { elapsed } => ghost_opacity * progress(elapsed),
        Fade::Out { elapsed } => ghost_opacity * (1.0 - progress(elapsed)),
    }
}

fn material_for(
    key: &SceneKey,
    object: &SceneObject,
    shape: &ShapeDescriptor,
    quality: &QualitySettings,
    opacity: f32,
    generation: u64,
) -> MaterialSpec {
    let ghost = key.is_ghost();
    MaterialSpec {
        color: object.properties.color,
        opacity,
        transparent: ghost,
        lighting: quality.lighting,
        emissive: shape.glow && quality.lighting == Lighting::Standard,
        casts_shadow: quality.shadows && !ghost,
        generation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object::{ObjectId, ObjectKind, ObjectProps, Scale};
    use crate::domain::quality::QualityPreset;

    fn object(id: &str, owner: &str) -> SceneObject {
        SceneObject {
            id: ObjectId::from(id),
            kind: ObjectKind::Cube,
            position: Vec3::new(0.0, 1.0, 0.0),
            properties: ObjectProps::primitive(Rgb(0x3366ff), Scale::Uniform(1.0)),
            owner_id: owner.to_string(),
            created_at: 0,
        }
    }

    fn store() -> SceneObjectStore {
        SceneObjectStore::new(QualitySettings::default(), SyncTuning::default())
    }

    #[test]
    fn when_local_id_is_inserted_twice_then_second_insert_fails() {
        let mut store = store();
        store.insert_local(object("a", "w1"), Placement::Free).expect("first insert");
        let err = store.insert_local(object("a", "w1"), Placement::Free).unwrap_err();
        assert_eq!(err, SyncError::AlreadyExists(ObjectId::from("a")));
    }

    #[test]
    fn when_ghost_fades_in_then_opacity_reaches_ghost_level() {
        let mut store = store();
        let key = SceneKey::peer("w2", ObjectId::from("a"));
        assert!(store.upsert_ghost(key.clone(), object("a", "w2")));
        assert_eq!(store.get(&key).map(|e| e.material.opacity), Some(0.0));

        store.advance(0.25);
        let half = store.get(&key).map(|e| e.material.opacity).unwrap_or_default();
        assert!((half - 0.25).abs() < 1e-5);

        store.advance(1.0);
        assert_eq!(store.get(&key).map(|e| e.material.opacity), Some(0.5));
    }

    #[test]
    fn when_ghost_fade_out_completes_then_entry_is_dropped() {
        let mut store = store();
        let key = SceneKey::peer("w2", ObjectId::from("a"));
        store.upsert_ghost(key.clone(), object("a", "w2"));
        store.advance(1.0);

        store.fade_out(&key);
        assert!(store.advance(0.2).is_empty());
        assert!(store.contains(&key));
        assert_eq!(store.advance(0.4), vec![key.clone()]);
        assert!(!store.contains(&key));
    }

    #[test]
    fn when_fading_ghost_is_upserted_then_it_is_revived_in_place() {
        let mut store = store();
        let key = SceneKey::peer("w2", ObjectId::from("a"));
        store.upsert_ghost(key.clone(), object("a", "w2"));
        store.advance(1.0);
        store.fade_out(&key);
        store.advance(0.1);

        assert!(!store.upsert_ghost(key.clone(), object("a", "w2")));
        assert_eq!(store.len(), 1);
        assert!(!store.get(&key).is_some_and(StoreEntry::is_fading_out));
        store.advance(2.0);
        assert!(store.contains(&key));
    }

    #[test]
    fn when_remote_move_is_blended_then_position_converges_over_smoothing_window() {
        let mut store = store();
        let key = SceneKey::peer("w2", ObjectId::from("a"));
        store.upsert_ghost(key.clone(), object("a", "w2"));

        store.blend_to(&key, Vec3::new(10.0, 1.0, 0.0));
        store.advance(0.1);
        let mid = store.object(&key).map(|o| o.position.x).unwrap_or_default();
        assert!((mid - 5.0).abs() < 1e-4);

        store.advance(0.2);
        assert_eq!(store.object(&key).map(|o| o.position.x), Some(10.0));
        assert!(!store.get(&key).is_some_and(StoreEntry::is_blending));
    }

    #[test]
    fn when_quality_changes_then_materials_rebuild_without_touching_transforms() {
        let mut store = store();
        store.insert_local(object("a", "w1"), Placement::Free).expect("insert");
        let key = SceneKey::local(ObjectId::from("a"));
        let before = store.object(&key).cloned();

        store.set_quality(QualitySettings::for_preset(QualityPreset::High));

        let entry = store.get(&key).expect("entry");
        assert_eq!(entry.material.generation, 1);
        assert!(entry.material.casts_shadow);
        assert_eq!(Some(&entry.object), before.as_ref());
    }
}
