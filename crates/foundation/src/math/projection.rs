//! Web-Mercator projection for the flat map view.
//!
//! Zoom follows the slippy-map convention: at zoom `z` the whole world is
//! `TILE_SIZE_PX * 2^z` pixels wide.

use std::f64::consts::{FRAC_PI_2, PI};

use super::{LatLng, Vec2, WGS84_A};

pub const MERCATOR_MAX_LAT_DEG: f64 = 85.051_128_78;
pub const TILE_SIZE_PX: f64 = 256.0;
/// Width of the projected world in Mercator meters.
pub const MERCATOR_WORLD_WIDTH_M: f64 = 2.0 * PI * WGS84_A;

pub fn wrap_lon_deg(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

pub fn mercator_x_m(lon_deg: f64) -> f64 {
    WGS84_A * lon_deg.to_radians()
}

pub fn mercator_y_m(lat_deg: f64) -> f64 {
    let lat = lat_deg
        .clamp(-MERCATOR_MAX_LAT_DEG, MERCATOR_MAX_LAT_DEG)
        .to_radians();
    WGS84_A * (0.5 * (FRAC_PI_2 + lat)).tan().ln()
}

/// Picks the copy of `x_m` (modulo the world width) closest to `anchor_x_m`.
pub fn unwrap_mercator_x_m(anchor_x_m: f64, x_m: f64) -> f64 {
    let ww = MERCATOR_WORLD_WIDTH_M;
    let dx = (x_m - anchor_x_m + 0.5 * ww).rem_euclid(ww) - 0.5 * ww;
    anchor_x_m + dx
}

/// Pixels per Mercator meter at `zoom`.
pub fn scale_px_per_m(zoom: f64) -> f64 {
    TILE_SIZE_PX * zoom.exp2() / MERCATOR_WORLD_WIDTH_M
}

/// Maps geographic coordinates to viewport pixels (origin top-left, y down).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenTransform {
    center_m: Vec2,
    scale: f64,
    half_viewport_px: Vec2,
}

impl ScreenTransform {
    pub fn new(center: LatLng, zoom: f64, viewport_px: [f64; 2]) -> Self {
        Self {
            center_m: Vec2::new(mercator_x_m(wrap_lon_deg(center.lng)), mercator_y_m(center.lat)),
            scale: scale_px_per_m(zoom),
            half_viewport_px: Vec2::new(0.5 * viewport_px[0], 0.5 * viewport_px[1]),
        }
    }

    /// Projects `p` to pixels, unwrapping longitude to the world copy nearest
    /// the viewport center. Returns `None` if the result is not finite.
    pub fn project(&self, p: LatLng) -> Option<Vec2> {
        let x_m = unwrap_mercator_x_m(self.center_m.x, mercator_x_m(p.lng));
        let y_m = mercator_y_m(p.lat);
        let px = Vec2::new(
            self.half_viewport_px.x + (x_m - self.center_m.x) * self.scale,
            self.half_viewport_px.y - (y_m - self.center_m.y) * self.scale,
        );
        px.is_finite().then_some(px)
    }
}
