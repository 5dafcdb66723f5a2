//! Country/region lookup used to label results for display.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

pub trait CountryInfo: fmt::Debug + Send + Sync {
    /// Name of the region containing `point`, if known.
    fn region_name(&self, point: &Point) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionArea {
    pub name: String,
    pub rect: Rect,
}

/// Rectangle-based region lookup. The smallest containing rectangle wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCountryInfo {
    regions: Vec<RegionArea>,
}

impl StaticCountryInfo {
    pub fn new(regions: Vec<RegionArea>) -> Self {
        Self { regions }
    }

    pub fn with_region(mut self, name: impl Into<String>, rect: Rect) -> Self {
        self.regions.push(RegionArea {
            name: name.into(),
            rect,
        });
        self
    }
}

impl CountryInfo for StaticCountryInfo {
    fn region_name(&self, point: &Point) -> Option<String> {
        self.regions
            .iter()
            .filter(|r| r.rect.contains_point(point))
            .min_by(|a, b| {
                let area = |r: &Rect| r.width_deg() * r.height_deg();
                area(&a.rect).total_cmp(&area(&b.rect))
            })
            .map(|r| r.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smallest_region_wins() {
        let info = StaticCountryInfo::default()
            .with_region("Country", Rect::from_bounds(0.0, 0.0, 10.0, 10.0))
            .with_region("State", Rect::from_bounds(1.0, 1.0, 3.0, 3.0));
        assert_eq!(info.region_name(&Point::new(2.0, 2.0)).as_deref(), Some("State"));
        assert_eq!(info.region_name(&Point::new(8.0, 8.0)).as_deref(), Some("Country"));
        assert_eq!(info.region_name(&Point::new(-5.0, 8.0)), None);
    }
}
