use foundation::math::Vec2;
use foundation::math::precision::stable_total_cmp_f64;

use crate::surface::{Primitive, PrimitiveKey};
use crate::viewport::FlatViewport;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub key: PrimitiveKey,
    pub distance_px: f64,
}

/// Deterministic screen picking over flat-map primitives.
///
/// Ordering contract:
/// - Only primitives whose hit circle (style radius plus `slop_px`) contains
///   `at` are considered.
/// - The nearest centre wins; at equal distance the lower key wins, so a
///   record marker beats a badge and lower ids beat higher ones.
/// - Globe points are ignored.
pub fn pick_screen<'a, I>(
    primitives: I,
    viewport: &FlatViewport,
    at: Vec2,
    slop_px: f64,
) -> Option<PickHit>
where
    I: IntoIterator<Item = &'a Primitive>,
{
    if !at.is_finite() {
        return None;
    }
    let transform = viewport.transform();
    let mut best: Option<PickHit> = None;
    for primitive in primitives {
        let position = match primitive {
            Primitive::Marker { position, .. } | Primitive::Badge { position, .. } => *position,
            Primitive::Point { .. } => continue,
        };
        let Some(center) = transform.project(position) else {
            continue;
        };
        let d = center.distance(at);
        let reach = f64::from(primitive.style().radius_px) + slop_px.max(0.0);
        if d > reach {
            continue;
        }
        let hit = PickHit {
            key: primitive.key(),
            distance_px: d,
        };
        best = match best {
            Some(b)
                if stable_total_cmp_f64(b.distance_px, d)
                    .then_with(|| b.key.cmp(&hit.key))
                    .is_le() =>
            {
                Some(b)
            }
            _ => Some(hit),
        };
    }
    best
}
