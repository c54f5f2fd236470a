// Scene object model shared by the store, the sync layer and the wire protocol.

use crate::domain::math::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque object identifier, unique per owning window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Sphere,
    Cube,
    Pyramid,
    Torus,
    Cylinder,
    Node,
    Building,
    Monument,
    Portal,
    FileCard,
    FolderCard,
    Avatar,
}

impl ObjectKind {
    /// Kinds a user can spawn from the object panel.
    pub const SPAWNABLE: [ObjectKind; 6] = [
        ObjectKind::Sphere,
        ObjectKind::Cube,
        ObjectKind::Pyramid,
        ObjectKind::Cylinder,
        ObjectKind::Torus,
        ObjectKind::Node,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Sphere => "sphere",
            ObjectKind::Cube => "cube",
            ObjectKind::Pyramid => "pyramid",
            ObjectKind::Torus => "torus",
            ObjectKind::Cylinder => "cylinder",
            ObjectKind::Node => "node",
            ObjectKind::Building => "building",
            ObjectKind::Monument => "monument",
            ObjectKind::Portal => "portal",
            ObjectKind::FileCard => "file-card",
            ObjectKind::FolderCard => "folder-card",
            ObjectKind::Avatar => "avatar",
        }
    }
}

/// 24-bit RGB color, serialized as a plain integer (`0xRRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn channels(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scale {
    Uniform(f32),
    PerAxis(Vec3),
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Uniform(1.0)
    }
}

impl Scale {
    pub fn axes(self) -> Vec3 {
        match self {
            Scale::Uniform(s) => Vec3::splat(s),
            Scale::PerAxis(v) => v,
        }
    }
}

/// Kind-specific properties. Consumers match on this instead of probing optional fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "kebab-case")]
pub enum KindProps {
    #[default]
    Primitive,
    Building {
        height: f32,
    },
    File {
        path: String,
    },
    Folder {
        path: String,
    },
    Portal {
        #[serde(default)]
        target: Option<String>,
    },
}

fn default_solid() -> bool {
    true
}

/// Common property envelope carried by every object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProps {
    pub color: Rgb,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default = "default_solid")]
    pub is_solid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub detail: KindProps,
}

impl ObjectProps {
    pub fn primitive(color: Rgb, scale: Scale) -> Self {
        Self {
            color,
            scale,
            is_solid: true,
            label: None,
            detail: KindProps::Primitive,
        }
    }
}

/// Partial property edit. Only the basic toggles are editable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_solid: Option<bool>,
}

impl PropsPatch {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.scale.is_none() && self.is_solid.is_none()
    }

    /// Merges the patch into `props`; returns true when anything changed.
    pub fn apply(&self, props: &mut ObjectProps) -> bool {
        let mut changed = false;
        if let Some(color) = self.color
            && props.color != color
        {
            props.color = color;
            changed = true;
        }
        if let Some(scale) = self.scale
            && props.scale != scale
        {
            props.scale = scale;
            changed = true;
        }
        if let Some(is_solid) = self.is_solid
            && props.is_solid != is_solid
        {
            props.is_solid = is_solid;
            changed = true;
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub position: Vec3,
    pub properties: ObjectProps,
    pub owner_id: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Where a store entry came from. Anything not `Local` is a ghost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Local,
    Peer(String),
    Relay(String),
}

/// Store key: ghost ids are namespaced by their source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneKey {
    pub origin: Origin,
    pub id: ObjectId,
}

impl SceneKey {
    pub fn local(id: ObjectId) -> Self {
        Self {
            origin: Origin::Local,
            id,
        }
    }

    pub fn peer(label: &str, id: ObjectId) -> Self {
        Self {
            origin: Origin::Peer(label.to_string()),
            id,
        }
    }

    pub fn relay(code: &str, id: ObjectId) -> Self {
        Self {
            origin: Origin::Relay(code.to_string()),
            id,
        }
    }

    pub fn is_ghost(&self) -> bool {
        self.origin != Origin::Local
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Origin::Local => write!(f, "local/{}", self.id),
            Origin::Peer(label) => write!(f, "peer:{label}/{}", self.id),
            Origin::Relay(code) => write!(f, "relay:{code}/{}", self.id),
        }
    }
}
