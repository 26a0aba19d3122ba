use foundation::math::{LatLng, MERCATOR_MAX_LAT_DEG, ScreenTransform, wrap_lon_deg};
use serde::{Deserialize, Serialize};

/// Camera of the flat map as reported by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatViewport {
    pub center_lat_deg: f64,
    pub center_lng_deg: f64,
    pub zoom: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl Default for FlatViewport {
    fn default() -> Self {
        Self {
            center_lat_deg: 0.0,
            center_lng_deg: 0.0,
            zoom: 2.0,
            width_px: 1280.0,
            height_px: 720.0,
        }
    }
}

impl FlatViewport {
    pub fn new(center: LatLng, zoom: f64, size_px: [f64; 2]) -> Self {
        Self {
            center_lat_deg: center.lat,
            center_lng_deg: center.lng,
            zoom,
            width_px: size_px[0],
            height_px: size_px[1],
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(self.center_lat_deg, self.center_lng_deg)
    }

    pub fn size_px(&self) -> [f64; 2] {
        [self.width_px, self.height_px]
    }

    pub fn transform(&self) -> ScreenTransform {
        ScreenTransform::new(self.center(), self.zoom, self.size_px())
    }

    /// Clamps zoom into `[min_zoom, max_zoom]`, keeps the centre inside the
    /// Mercator band and wraps longitude into [-180, 180).
    pub fn normalized(self, min_zoom: f64, max_zoom: f64) -> Self {
        let zoom = if self.zoom.is_finite() {
            self.zoom.clamp(min_zoom, max_zoom)
        } else {
            min_zoom
        };
        let lat = if self.center_lat_deg.is_finite() {
            self.center_lat_deg
                .clamp(-MERCATOR_MAX_LAT_DEG, MERCATOR_MAX_LAT_DEG)
        } else {
            0.0
        };
        let lng = if self.center_lng_deg.is_finite() {
            wrap_lon_deg(self.center_lng_deg)
        } else {
            0.0
        };
        Self {
            center_lat_deg: lat,
            center_lng_deg: lng,
            zoom,
            ..self
        }
    }

    /// Same viewport size, recentred on `center` at `zoom`.
    pub fn looking_at(self, center: LatLng, zoom: f64) -> Self {
        Self {
            center_lat_deg: center.lat,
            center_lng_deg: center.lng,
            zoom,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FlatViewport;
    use foundation::math::{LatLng, MERCATOR_MAX_LAT_DEG};

    #[test]
    fn normalized_clamps_zoom_and_latitude() {
        let v = FlatViewport::new(LatLng::new(89.0, 190.0), 25.0, [800.0, 600.0])
            .normalized(0.0, 18.0);
        assert_eq!(v.zoom, 18.0);
        assert_eq!(v.center_lat_deg, MERCATOR_MAX_LAT_DEG);
        assert!((v.center_lng_deg - -170.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_fields_fall_back() {
        let center = LatLng::new(f64::NAN, f64::INFINITY);
        let v = FlatViewport::new(center, f64::NAN, [800.0, 600.0]).normalized(1.0, 18.0);
        assert_eq!(v.zoom, 1.0);
        assert_eq!(v.center(), LatLng::new(0.0, 0.0));
    }

    #[test]
    fn looking_at_keeps_size() {
        let v = FlatViewport::default().looking_at(LatLng::new(10.0, 20.0), 6.0);
        assert_eq!(v.size_px(), [1280.0, 720.0]);
        assert_eq!(v.zoom, 6.0);
        assert_eq!(v.center(), LatLng::new(10.0, 20.0));
    }
}
