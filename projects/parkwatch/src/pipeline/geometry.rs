use crate::layout::Point;
use geo::Intersects;
use geo_types::{LineString, Point as GeoPoint, Polygon};

/// Convert our layout points to a geo_types Polygon
fn to_geo_polygon(points: &[Point]) -> Polygon<f64> {
    let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let ls = LineString::from(coords);
    Polygon::new(ls, vec![])
}

/// A slot polygon prepared for repeated point tests
pub struct SlotRegion {
    polygon: Polygon<f64>,
}

impl SlotRegion {
    pub fn new(points: &[Point]) -> Self {
        Self {
            polygon: to_geo_polygon(points),
        }
    }

    /// True when the point lies inside the polygon or on its boundary.
    pub fn contains_point(&self, p: Point) -> bool {
        self.polygon
            .intersects(&GeoPoint::new(p.x as f64, p.y as f64))
    }
}

/// For each region, whether any of the points falls inside it.
pub fn occupied_regions(regions: &[SlotRegion], points: &[Point]) -> Vec<bool> {
    regions
        .iter()
        .map(|region| points.iter().any(|p| region.contains_point(*p)))
        .collect()
}
