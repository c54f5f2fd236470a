// Procedural levels generated from a directory listing.

use super::scene_store::{Placement, SceneObjectStore};
use crate::domain::collision::{Aabb, ColliderSource, CollisionField};
use crate::domain::hotspot::{Hotspot, HotspotTarget, nearest_within};
use crate::domain::math::Vec3;
use crate::domain::object::{
    KindProps, ObjectId, ObjectKind, ObjectProps, Rgb, Scale, SceneKey, SceneObject,
};
use crate::domain::ports::{DirEntry, parent_path};
use rand::Rng;
use rand::rngs::StdRng;
use std::f32::consts::TAU;
use tracing::{debug, info, warn};

pub const MAX_ENTRIES: usize = 100;
pub const INTERACT_COOLDOWN_MS: u64 = 500;
/// Touch users confirm by walking right up to a hotspot.
pub const TOUCH_CONFIRM_DISTANCE: f32 = 1.5;

const BLOCK_SIZE: f32 = 6.0;
const STREET_WIDTH: f32 = 8.0;
const BUILDING_FOOTPRINT: f32 = 5.0;
const CITY_SPAWN_Z: f32 = 15.0;
const ROOM_HALF: f32 = 10.0;
const ROOM_HEIGHT: f32 = 8.0;
const ROOM_FILE_RADIUS: f32 = 6.0;
const ROOM_SPAWN_Z: f32 = 8.0;
const SPAWN_HEIGHT: f32 = 2.0;
const ID_PREFIX: &str = "city-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelLayout {
    /// Exploration root: buildings on a street grid.
    City,
    /// Nested directory: a single room with a way back.
    Room,
}

/// A generated level, ready to be applied to a store and collision field.
#[derive(Debug, Clone)]
pub struct CityLevel {
    pub path: String,
    pub layout: LevelLayout,
    pub objects: Vec<SceneObject>,
    pub colliders: Vec<Aabb>,
    pub hotspots: Vec<Hotspot>,
    pub spawn: Vec3,
    /// Spawn yaw; 0 faces -Z, toward the level.
    pub spawn_yaw: f32,
    pub truncated: usize,
}

/// What the player asked for at a hotspot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityAction {
    Enter(String),
    Open(String),
    /// Leave `from` for its parent, or for `root` when `from` has none.
    Back { from: String, root: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CityPoll {
    pub prompt: Option<String>,
    pub action: Option<CityAction>,
}

pub struct ProceduralCityBuilder {
    owner: String,
    rng: StdRng,
    root: Option<String>,
    current: Option<String>,
    hotspots: Vec<Hotspot>,
    object_keys: Vec<SceneKey>,
    next_id: u64,
    last_trigger_ms: Option<u64>,
}

impl ProceduralCityBuilder {
    pub fn new(owner: impl Into<String>, rng: StdRng) -> Self {
        Self {
            owner: owner.into(),
            rng,
            root: None,
            current: None,
            hotspots: Vec::new(),
            object_keys: Vec::new(),
            next_id: 0,
            last_trigger_ms: None,
        }
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    /// Starts a new exploration rooted at `path`.
    pub fn set_root(&mut self, path: impl Into<String>) {
        self.root = Some(path.into());
    }

    /// Builds the level for `path` and replaces the previous one.
    pub fn build(
        &mut self,
        path: &str,
        entries: Vec<DirEntry>,
        store: &mut SceneObjectStore,
        field: &mut CollisionField,
        now_ms: u64,
    ) -> CityLevel {
        if self.root.is_none() {
            self.root = Some(path.to_string());
        }
        let layout = if self.root.as_deref() == Some(path) {
            LevelLayout::City
        } else {
            LevelLayout::Room
        };
        let level = self.layout(path, entries, layout);
        self.apply(&level, store, field, now_ms);
        level
    }

    /// Pure layout step: no store or collision mutation.
    pub fn layout(&mut self, path: &str, entries: Vec<DirEntry>, layout: LevelLayout) -> CityLevel {
        let total = entries.len();
        let truncated = total.saturating_sub(MAX_ENTRIES);
        if truncated > 0 {
            warn!(path, total, kept = MAX_ENTRIES, "directory listing truncated");
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries.into_iter().take(MAX_ENTRIES) {
            let by_name = looks_like_directory(&entry.name);
            if let Some(actual) = entry.is_directory
                && actual != by_name
            {
                debug!(name = %entry.name, actual, by_name, "name heuristic disagrees with reader");
            }
            if by_name {
                dirs.push(entry);
            } else {
                files.push(entry);
            }
        }

        let mut level = CityLevel {
            path: path.to_string(),
            layout,
            objects: Vec::new(),
            colliders: Vec::new(),
            hotspots: Vec::new(),
            spawn: Vec3::ZERO,
            spawn_yaw: 0.0,
            truncated,
        };
        match layout {
            LevelLayout::City => self.layout_city(&mut level, &dirs, &files),
            LevelLayout::Room => self.layout_room(&mut level, &dirs, &files),
        }
        level
    }

    /// Clears this builder's previous objects and colliders, then installs `level`.
    pub fn apply(
        &mut self,
        level: &CityLevel,
        store: &mut SceneObjectStore,
        field: &mut CollisionField,
        now_ms: u64,
    ) {
        self.clear(store, field);
        for object in &level.objects {
            let key = SceneKey::local(object.id.clone());
            if let Err(e) = store.insert_local(object.clone(), Placement::Fixed) {
                warn!(error = %e, "skipping duplicate level object");
                continue;
            }
            self.object_keys.push(key);
        }
        for aabb in &level.colliders {
            field.add(ColliderSource::City, *aabb);
        }
        self.hotspots = level.hotspots.clone();
        self.current = Some(level.path.clone());
        // Do not let the confirm that loaded this level trigger the next one.
        self.last_trigger_ms = Some(now_ms);
        info!(
            path = %level.path,
            layout = ?level.layout,
            objects = level.objects.len(),
            hotspots = level.hotspots.len(),
            "level built"
        );
    }

    pub fn clear(&mut self, store: &mut SceneObjectStore, field: &mut CollisionField) {
        for key in self.object_keys.drain(..) {
            store.remove(&key);
        }
        field.clear_source(&ColliderSource::City);
        self.hotspots.clear();
    }

    /// Per-frame hotspot check around the player's feet.
    pub fn poll(
        &mut self,
        player: Vec3,
        confirm: bool,
        joystick_active: bool,
        now_ms: u64,
    ) -> CityPoll {
        let Some((hotspot, distance)) = nearest_within(&self.hotspots, player) else {
            return CityPoll::default();
        };
        let prompt = Some(hotspot.prompt());
        let confirmed = confirm || (joystick_active && distance < TOUCH_CONFIRM_DISTANCE);
        let cooling = self
            .last_trigger_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < INTERACT_COOLDOWN_MS);
        if !confirmed || cooling {
            return CityPoll {
                prompt,
                action: None,
            };
        }

        let action = match &hotspot.target {
            HotspotTarget::Directory(path) => CityAction::Enter(path.clone()),
            HotspotTarget::File(path) => CityAction::Open(path.clone()),
            HotspotTarget::Back => self.back_action(),
        };
        self.last_trigger_ms = Some(now_ms);
        debug!(?action, "hotspot triggered");
        CityPoll {
            prompt,
            action: Some(action),
        }
    }

    /// Back from the current level. The parent itself is resolved by the
    /// directory reader.
    pub fn back_action(&self) -> CityAction {
        let root = self.root.clone().unwrap_or_default();
        let from = self.current.clone().unwrap_or_else(|| root.clone());
        CityAction::Back { from, root }
    }

    fn layout_city(&mut self, level: &mut CityLevel, dirs: &[DirEntry], files: &[DirEntry]) {
        let spacing = BLOCK_SIZE + STREET_WIDTH;
        let cols = (dirs.len() as f32).sqrt().ceil().max(1.0) as usize;
        let rows = dirs.len().div_ceil(cols).max(1);
        let x0 = (cols as f32 - 1.0) / 2.0;
        let z0 = (rows as f32 - 1.0) / 2.0;

        for (i, dir) in dirs.iter().enumerate() {
            let (col, row) = (i % cols, i / cols);
            let x = (col as f32 - x0) * spacing;
            let z = (row as f32 - z0) * spacing;
            let height = self.building_height(&dir.name);
            let half = BUILDING_FOOTPRINT / 2.0;

            let color = Rgb(0x203040 + (self.rng.gen_range(0..0x30) << 8));
            let mut props = ObjectProps::primitive(
                color,
                Scale::PerAxis(Vec3::new(BUILDING_FOOTPRINT, height, BUILDING_FOOTPRINT)),
            );
            props.label = Some(dir.name.clone());
            props.detail = KindProps::Building { height };
            let building = self.object(ObjectKind::Building, Vec3::new(x, height / 2.0, z), props);
            level.objects.push(building);
            level.colliders.push(Aabb::new(
                Vec3::new(x - half, 0.0, z - half),
                Vec3::new(x + half, height, z + half),
            ));

            let mut door = ObjectProps::primitive(Rgb(0x00ffff), Scale::PerAxis(Vec3::new(2.0, 3.0, 1.0)));
            door.is_solid = false;
            door.label = Some(dir.name.clone());
            door.detail = KindProps::Folder {
                path: dir.path.clone(),
            };
            let door = self.object(ObjectKind::FolderCard, Vec3::new(x, 1.5, z + half + 0.05), door);
            level.objects.push(door);
            level.hotspots.push(Hotspot {
                position: Vec3::new(x, 0.0, z + half + 1.0),
                radius: 5.0,
                name: dir.name.clone(),
                target: HotspotTarget::Directory(dir.path.clone()),
            });
        }

        let ring = cols as f32 * spacing / 2.0 + 10.0;
        for (i, file) in files.iter().enumerate() {
            let angle = i as f32 / files.len() as f32 * TAU;
            let (x, z) = (angle.cos() * ring, angle.sin() * ring);

            let pedestal = self.pedestal(Vec3::new(x, 0.5, z), Vec3::new(1.5, 1.0, 1.5));
            level.objects.push(pedestal);
            level
                .colliders
                .push(Aabb::from_center(Vec3::new(x, 0.5, z), Vec3::new(0.75, 0.5, 0.75)));

            let mut props = ObjectProps::primitive(extension_color(&file.name), Scale::Uniform(1.0));
            props.is_solid = false;
            props.label = Some(file.name.clone());
            props.detail = KindProps::File {
                path: file.path.clone(),
            };
            let monument = self.object(ObjectKind::Monument, Vec3::new(x, 1.6, z), props);
            level.objects.push(monument);
            level.hotspots.push(Hotspot {
                position: Vec3::new(x, 0.0, z),
                radius: 2.5,
                name: file.name.clone(),
                target: HotspotTarget::File(file.path.clone()),
            });
        }

        level.colliders.push(floor_collider(500.0));
        // Spawn in front of the grid, on the street in front of the first row.
        let grid_front = z0 * spacing + BUILDING_FOOTPRINT / 2.0 + STREET_WIDTH / 2.0;
        level.spawn = Vec3::new(0.0, SPAWN_HEIGHT, CITY_SPAWN_Z.max(grid_front + 1.0));
    }

    fn layout_room(&mut self, level: &mut CityLevel, dirs: &[DirEntry], files: &[DirEntry]) {
        self.room_shell(level);

        for (i, file) in files.iter().enumerate() {
            let angle = i as f32 / files.len() as f32 * TAU;
            let (x, z) = (angle.cos() * ROOM_FILE_RADIUS, angle.sin() * ROOM_FILE_RADIUS);

            let pedestal = self.pedestal(Vec3::new(x, 0.25, z), Vec3::new(1.0, 0.5, 1.0));
            level.objects.push(pedestal);

            let mut props = ObjectProps::primitive(extension_color(&file.name), Scale::Uniform(1.0));
            props.label = Some(file.name.clone());
            props.detail = KindProps::File {
                path: file.path.clone(),
            };
            let card = self.object(ObjectKind::FileCard, Vec3::new(x, 1.5, z), props);
            level.objects.push(card);
            level
                .colliders
                .push(Aabb::from_center(Vec3::new(x, 1.0, z), Vec3::new(0.5, 1.0, 0.5)));
            level.hotspots.push(Hotspot {
                position: Vec3::new(x, 0.0, z),
                radius: 2.0,
                name: file.name.clone(),
                target: HotspotTarget::File(file.path.clone()),
            });
        }

        // Elevators line the north, west and east walls.
        let per_wall = dirs.len().div_ceil(3).max(1);
        let inset = ROOM_HALF - 1.0;
        for (i, dir) in dirs.iter().enumerate() {
            let (wall, slot) = (i / per_wall, i % per_wall);
            let along = if per_wall == 1 {
                0.0
            } else {
                -inset + 2.0 * inset * slot as f32 / (per_wall as f32 - 1.0)
            };
            let position = match wall {
                0 => Vec3::new(along, 1.5, -inset),
                1 => Vec3::new(-inset, 1.5, along),
                _ => Vec3::new(inset, 1.5, along),
            };

            let mut props = ObjectProps::primitive(Rgb(0xffaa00), Scale::PerAxis(Vec3::new(2.0, 3.0, 2.0)));
            props.is_solid = false;
            props.label = Some(dir.name.clone());
            props.detail = KindProps::Folder {
                path: dir.path.clone(),
            };
            let elevator = self.object(ObjectKind::FolderCard, position, props);
            level.objects.push(elevator);
            level.hotspots.push(Hotspot {
                position: Vec3::new(position.x, 0.0, position.z),
                radius: 3.0,
                name: dir.name.clone(),
                target: HotspotTarget::Directory(dir.path.clone()),
            });
        }

        let portal_at = Vec3::new(0.0, 2.0, ROOM_HALF - 0.5);
        let mut portal = ObjectProps::primitive(Rgb(0xff00ff), Scale::Uniform(2.0));
        portal.is_solid = false;
        portal.label = Some("..".to_string());
        portal.detail = KindProps::Portal {
            target: Some(parent_path(&level.path)),
        };
        let portal = self.object(ObjectKind::Portal, portal_at, portal);
        level.objects.push(portal);
        level.hotspots.push(Hotspot {
            position: Vec3::new(portal_at.x, 0.0, portal_at.z),
            radius: 4.0,
            name: "..".to_string(),
            target: HotspotTarget::Back,
        });

        level.spawn = Vec3::new(0.0, SPAWN_HEIGHT, ROOM_SPAWN_Z);
    }

    fn room_shell(&mut self, level: &mut CityLevel) {
        let h = ROOM_HALF;
        let slabs = [
            // floor, ceiling
            (Vec3::new(-h, -1.0, -h), Vec3::new(h, 0.0, h)),
            (Vec3::new(-h, ROOM_HEIGHT, -h), Vec3::new(h, ROOM_HEIGHT + 1.0, h)),
            // north, south, west, east walls
            (Vec3::new(-h, 0.0, -h - 0.5), Vec3::new(h, ROOM_HEIGHT, -h)),
            (Vec3::new(-h, 0.0, h), Vec3::new(h, ROOM_HEIGHT, h + 0.5)),
            (Vec3::new(-h - 0.5, 0.0, -h), Vec3::new(-h, ROOM_HEIGHT, h)),
            (Vec3::new(h, 0.0, -h), Vec3::new(h + 0.5, ROOM_HEIGHT, h)),
        ];
        for (min, max) in slabs {
            let size = max - min;
            let center = min + size * 0.5;
            let mut props = ObjectProps::primitive(Rgb(0x1a1a2e), Scale::PerAxis(size));
            props.is_solid = false;
            let slab = self.object(ObjectKind::Cube, center, props);
            level.objects.push(slab);
            level.colliders.push(Aabb::new(min, max));
        }
    }

    fn pedestal(&mut self, center: Vec3, size: Vec3) -> SceneObject {
        let mut props = ObjectProps::primitive(Rgb(0x555555), Scale::PerAxis(size));
        props.is_solid = false;
        self.object(ObjectKind::Cylinder, center, props)
    }

    fn building_height(&mut self, name: &str) -> f32 {
        match name {
            "src" | "code" => 15.0,
            "node_modules" | ".git" => 5.0,
            "bin" | "system" => 12.0,
            _ => self.rng.gen_range(6.0..12.0),
        }
    }

    /// Level objects are local and never replicated.
    fn object(&mut self, kind: ObjectKind, position: Vec3, properties: ObjectProps) -> SceneObject {
        self.next_id += 1;
        SceneObject {
            id: ObjectId(format!("{ID_PREFIX}{}", self.next_id)),
            kind,
            position,
            properties,
            owner_id: self.owner.clone(),
            created_at: 0,
        }
    }
}

/// Names without a `.` are treated as directories.
pub fn looks_like_directory(name: &str) -> bool {
    !name.contains('.')
}

fn extension_color(name: &str) -> Rgb {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("rs") => Rgb(0xdea584),
        Some("js" | "ts" | "jsx" | "tsx") => Rgb(0xf7df1e),
        Some("md" | "txt") => Rgb(0x4a90d9),
        Some("json" | "toml" | "yaml" | "yml") => Rgb(0x9b59b6),
        Some("png" | "jpg" | "jpeg" | "gif" | "svg") => Rgb(0x2ecc71),
        _ => Rgb(0x95a5a6),
    }
}

fn floor_collider(half: f32) -> Aabb {
    Aabb::new(Vec3::new(-half, -1.0, -half), Vec3::new(half, 0.0, half))
}
