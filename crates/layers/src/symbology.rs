use std::collections::BTreeMap;

use catalog::Category;
use serde::{Deserialize, Serialize};

/// Resolved drawing parameters for a single primitive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerStyle {
    pub color: [f32; 4],
    pub radius_px: f32,
    /// Lift as a fraction of Earth radius (WGS84_A). Ignored by the flat map.
    pub lift: f32,
}

impl MarkerStyle {
    pub const fn new(color: [f32; 4], radius_px: f32, lift: f32) -> Self {
        Self {
            color,
            radius_px,
            lift,
        }
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            radius_px: 6.0,
            lift: 0.0,
        }
    }
}

/// Colour and size rules shared by both adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Symbology {
    pub marker_radius_px: f32,
    pub badge_radius_px: f32,
    /// Extra badge radius per doubling of the member count.
    pub badge_growth_px: f32,
    pub badge_color: [f32; 4],
    pub fallback_color: [f32; 4],
    /// Globe point lift as a fraction of Earth radius (WGS84_A).
    pub globe_lift: f32,
    pub palette: BTreeMap<Category, [f32; 4]>,
}

impl Default for Symbology {
    fn default() -> Self {
        let palette = BTreeMap::from([
            (Category::Forest, [0.13, 0.55, 0.13, 1.0]),
            (Category::Grassland, [0.60, 0.80, 0.20, 1.0]),
            (Category::Wetland, [0.37, 0.62, 0.63, 1.0]),
            (Category::Freshwater, [0.12, 0.56, 1.00, 1.0]),
            (Category::Marine, [0.00, 0.30, 0.60, 1.0]),
            (Category::Coastal, [0.25, 0.88, 0.82, 1.0]),
            (Category::Dryland, [0.82, 0.71, 0.55, 1.0]),
            (Category::Mountain, [0.55, 0.47, 0.42, 1.0]),
            (Category::Agricultural, [0.85, 0.65, 0.13, 1.0]),
            (Category::Urban, [0.50, 0.50, 0.50, 1.0]),
        ]);
        Self {
            marker_radius_px: 6.0,
            badge_radius_px: 14.0,
            badge_growth_px: 3.0,
            badge_color: [0.95, 0.45, 0.10, 0.9],
            fallback_color: [1.0, 1.0, 1.0, 1.0],
            globe_lift: 0.001,
            palette,
        }
    }
}

impl Symbology {
    pub fn category_color(&self, category: Category) -> [f32; 4] {
        self.palette
            .get(&category)
            .copied()
            .unwrap_or(self.fallback_color)
    }

    pub fn marker_style(&self, category: Category) -> MarkerStyle {
        MarkerStyle::new(self.category_color(category), self.marker_radius_px, 0.0)
    }

    /// Badge radius grows with log2 of the member count so dense clusters
    /// stay readable without swamping the map.
    pub fn badge_style(&self, count: usize) -> MarkerStyle {
        let doublings = (count.max(1) as f32).log2();
        MarkerStyle::new(
            self.badge_color,
            self.badge_radius_px + self.badge_growth_px * doublings,
            0.0,
        )
    }

    pub fn globe_style(&self, category: Category) -> MarkerStyle {
        MarkerStyle::new(
            self.category_color(category),
            self.marker_radius_px,
            self.globe_lift,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Symbology;
    use catalog::Category;

    #[test]
    fn every_category_has_a_distinct_colour() {
        let s = Symbology::default();
        let mut seen = Vec::new();
        for c in Category::ALL {
            let color = s.category_color(c);
            assert_ne!(color, s.fallback_color, "{c:?} falls back");
            assert!(!seen.contains(&color), "{c:?} reuses a colour");
            seen.push(color);
        }
    }

    #[test]
    fn badges_grow_with_count() {
        let s = Symbology::default();
        let two = s.badge_style(2).radius_px;
        let sixty_four = s.badge_style(64).radius_px;
        assert!(two > s.badge_radius_px);
        assert!(sixty_four > two);
    }

    #[test]
    fn missing_palette_entry_uses_fallback() {
        let mut s = Symbology::default();
        s.palette.remove(&Category::Urban);
        assert_eq!(s.marker_style(Category::Urban).color, s.fallback_color);
    }

    #[test]
    fn only_globe_style_is_lifted() {
        let s = Symbology::default();
        assert_eq!(s.marker_style(Category::Forest).lift, 0.0);
        assert!(s.globe_style(Category::Forest).lift > 0.0);
    }
}
