// Parking layout definitions
//
// A layout is a JSON list of slot polygons in frame pixel coordinates:
// [{"points": [[x, y], [x, y], ...]}, ...]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A 2D point in frame pixel coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned box in frame pixel coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.w / 2.0,
            y: self.y + self.h / 2.0,
        }
    }
}

/// One slot as stored on disk
#[derive(Serialize, Deserialize, Debug, Clone)]
struct SlotEntry {
    points: Vec<[f32; 2]>,
}

/// A single parking slot polygon
#[derive(Debug, Clone)]
pub struct ParkingSlot {
    pub polygon: Vec<Point>,
}

#[derive(Debug, Clone, Default)]
pub struct ParkingLayout {
    pub slots: Vec<ParkingSlot>,
}

impl ParkingLayout {
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<SlotEntry> =
            serde_json::from_str(content).context("Malformed parking layout")?;

        let slots = entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                if entry.points.len() < 3 {
                    anyhow::bail!(
                        "Slot {} has {} points, a polygon needs at least 3",
                        idx,
                        entry.points.len()
                    );
                }
                Ok(ParkingSlot {
                    polygon: entry
                        .points
                        .into_iter()
                        .map(|[x, y]| Point { x, y })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { slots })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read parking layout at {:?}", path))?;
        let layout = Self::from_json(&content)?;
        tracing::info!("Loaded {} parking slots from {:?}", layout.len(), path);
        Ok(layout)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout() {
        let json = r#"[
            {"points": [[10, 10], [110, 10], [110, 60], [10, 60]]},
            {"points": [[120.5, 10], [220, 10], [220, 60]]}
        ]"#;
        let layout = ParkingLayout::from_json(json).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.slots[0].polygon[1], Point { x: 110.0, y: 10.0 });
        assert_eq!(layout.slots[1].polygon[0].x, 120.5);
    }

    #[test]
    fn test_empty_layout() {
        let layout = ParkingLayout::from_json("[]").unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let json = r#"[{"points": [[0, 0], [1, 1]]}]"#;
        assert!(ParkingLayout::from_json(json).is_err());
    }

    #[test]
    fn test_bbox_center() {
        let b = BBox {
            x: 10.0,
            y: 20.0,
            w: 30.0,
            h: 40.0,
        };
        assert_eq!(b.center(), Point { x: 25.0, y: 40.0 });
    }
}
