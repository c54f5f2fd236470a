// Proximity-triggered interaction points produced by the city builder.

use crate::domain::math::Vec3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotspotTarget {
    /// Descend into a directory.
    Directory(String),
    /// Ask the host to open a file externally.
    File(String),
    /// Go back to the parent level.
    Back,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub position: Vec3,
    pub radius: f32,
    pub name: String,
    pub target: HotspotTarget,
}

impl Hotspot {
    pub fn prompt(&self) -> String {
        match &self.target {
            HotspotTarget::Directory(_) => format!("[E] ENTER: {}", self.name),
            HotspotTarget::Back => "[E] BACK (..)".to_string(),
            HotspotTarget::File(_) => format!("[E] OPEN: {}", self.name),
        }
    }
}

/// Nearest hotspot whose trigger radius contains `point`, with its distance.
pub fn nearest_within<'a>(hotspots: &'a [Hotspot], point: Vec3) -> Option<(&'a Hotspot, f32)> {
    hotspots
        .iter()
        .map(|h| (h, h.position.distance(point)))
        .filter(|(h, dist)| *dist < h.radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotspot(x: f32, radius: f32, target: HotspotTarget) -> Hotspot {
        Hotspot {
            position: Vec3::new(x, 0.0, 0.0),
            radius,
            name: format!("h{x}"),
            target,
        }
    }

    #[test]
    fn nearest_hotspot_inside_radius_wins() {
        let hotspots = vec![
            hotspot(0.0, 5.0, HotspotTarget::Back),
            hotspot(3.0, 5.0, HotspotTarget::File("/a.txt".into())),
            hotspot(20.0, 50.0, HotspotTarget::Directory("/d".into())),
        ];
        let (found, dist) = nearest_within(&hotspots, Vec3::new(2.5, 0.0, 0.0)).expect("hit");
        assert_eq!(found.target, HotspotTarget::File("/a.txt".into()));
        assert!((dist - 0.5).abs() < 1e-5);
    }

    #[test]
    fn nothing_is_found_outside_every_radius() {
        let hotspots = vec![hotspot(0.0, 1.0, HotspotTarget::Back)];
        assert!(nearest_within(&hotspots, Vec3::new(2.0, 0.0, 0.0)).is_none());
    }
}
