use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use foundation::RecordId;
use foundation::math::{Ecef, LatLng};

use crate::cluster::ClusterId;
use crate::symbology::MarkerStyle;

/// Opaque engine handle for one drawn primitive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveHandle(pub u64);

/// Identity of a primitive independent of the engine handle it was drawn with.
///
/// Record keys sort before cluster keys, so iteration order matches the
/// "lower id wins" tie rule used by picking.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKey {
    Record(RecordId),
    Cluster(ClusterId),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Primitive {
    /// One record on the flat map.
    Marker {
        record: RecordId,
        position: LatLng,
        style: MarkerStyle,
    },
    /// A multi-member cluster on the flat map.
    Badge {
        cluster: ClusterId,
        position: LatLng,
        count: usize,
        style: MarkerStyle,
    },
    /// One record on the globe, in WGS84 ECEF metres (lift already applied).
    Point {
        record: RecordId,
        position: Ecef,
        style: MarkerStyle,
    },
}

impl Primitive {
    pub fn key(&self) -> PrimitiveKey {
        match self {
            Primitive::Marker { record, .. } | Primitive::Point { record, .. } => {
                PrimitiveKey::Record(*record)
            }
            Primitive::Badge { cluster, .. } => PrimitiveKey::Cluster(*cluster),
        }
    }

    pub fn style(&self) -> &MarkerStyle {
        match self {
            Primitive::Marker { style, .. }
            | Primitive::Badge { style, .. }
            | Primitive::Point { style, .. } => style,
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            Primitive::Marker { position, .. } | Primitive::Badge { position, .. } => {
                position.lat.is_finite() && position.lng.is_finite()
            }
            Primitive::Point { position, .. } => position.is_finite(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The record could not be projected to finite screen coordinates.
    NonFiniteProjection { record: RecordId },
    /// The primitive carries a non-finite position.
    NonFinitePosition { key: PrimitiveKey },
    /// The engine refused the primitive.
    Rejected { key: PrimitiveKey, reason: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NonFiniteProjection { record } => {
                write!(f, "record {record} has no finite screen projection")
            }
            RenderError::NonFinitePosition { key } => {
                write!(f, "primitive {key:?} has a non-finite position")
            }
            RenderError::Rejected { key, reason } => {
                write!(f, "engine rejected primitive {key:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// The drawing engine as seen by a view adapter.
pub trait RenderSurface {
    fn draw(&mut self, primitive: &Primitive) -> Result<PrimitiveHandle, RenderError>;
    fn remove(&mut self, handle: PrimitiveHandle);
    fn set_highlight(&mut self, handle: Option<PrimitiveHandle>);
}

/// In-memory surface that keeps the live primitive set.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_handle: u64,
    live: BTreeMap<PrimitiveHandle, Primitive>,
    highlight: Option<PrimitiveHandle>,
    refused: BTreeSet<PrimitiveKey>,
    draw_calls: usize,
    remove_calls: usize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `draw` of `key` fail until [`HeadlessSurface::accept`].
    pub fn refuse(&mut self, key: PrimitiveKey) {
        self.refused.insert(key);
    }

    pub fn accept(&mut self, key: PrimitiveKey) {
        self.refused.remove(&key);
    }

    pub fn live(&self) -> impl Iterator<Item = (PrimitiveHandle, &Primitive)> + '_ {
        self.live.iter().map(|(h, p)| (*h, p))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Keys of every live primitive, ascending.
    pub fn live_keys(&self) -> Vec<PrimitiveKey> {
        let mut keys: Vec<PrimitiveKey> = self.live.values().map(Primitive::key).collect();
        keys.sort();
        keys
    }

    pub fn get(&self, handle: PrimitiveHandle) -> Option<&Primitive> {
        self.live.get(&handle)
    }

    pub fn highlight(&self) -> Option<PrimitiveHandle> {
        self.highlight
    }

    pub fn highlighted_key(&self) -> Option<PrimitiveKey> {
        self.highlight
            .and_then(|h| self.live.get(&h))
            .map(Primitive::key)
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls
    }
}

impl RenderSurface for HeadlessSurface {
    fn draw(&mut self, primitive: &Primitive) -> Result<PrimitiveHandle, RenderError> {
        self.draw_calls += 1;
        let key = primitive.key();
        if !primitive.is_finite() {
            return Err(RenderError::NonFinitePosition { key });
        }
        if self.refused.contains(&key) {
            return Err(RenderError::Rejected {
                key,
                reason: "refused by surface".to_string(),
            });
        }
        self.next_handle += 1;
        let handle = PrimitiveHandle(self.next_handle);
        self.live.insert(handle, *primitive);
        Ok(handle)
    }

    fn remove(&mut self, handle: PrimitiveHandle) {
        self.remove_calls += 1;
        self.live.remove(&handle);
        if self.highlight == Some(handle) {
            self.highlight = None;
        }
    }

    fn set_highlight(&mut self, handle: Option<PrimitiveHandle>) {
        self.highlight = handle.filter(|h| self.live.contains_key(h));
    }
}

#[cfg(test)]
mod tests {
    use super::{HeadlessSurface, Primitive, PrimitiveKey, RenderError, RenderSurface};
    use crate::symbology::MarkerStyle;
    use foundation::RecordId;
    use foundation::math::LatLng;

    fn marker(id: u64, lat: f64) -> Primitive {
        Primitive::Marker {
            record: RecordId(id),
            position: LatLng::new(lat, 0.0),
            style: MarkerStyle::default(),
        }
    }

    #[test]
    fn draw_and_remove_track_live_set() {
        let mut s = HeadlessSurface::new();
        let a = s.draw(&marker(1, 0.0)).unwrap();
        let b = s.draw(&marker(2, 0.0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(s.live_count(), 2);
        s.remove(a);
        assert_eq!(s.live_keys(), vec![PrimitiveKey::Record(RecordId(2))]);
    }

    #[test]
    fn non_finite_primitive_is_rejected() {
        let mut s = HeadlessSurface::new();
        let err = s.draw(&marker(1, f64::NAN)).unwrap_err();
        assert_eq!(
            err,
            RenderError::NonFinitePosition {
                key: PrimitiveKey::Record(RecordId(1))
            }
        );
        assert_eq!(s.live_count(), 0);
    }

    #[test]
    fn refused_key_fails_until_accepted() {
        let mut s = HeadlessSurface::new();
        let key = PrimitiveKey::Record(RecordId(7));
        s.refuse(key);
        assert!(matches!(s.draw(&marker(7, 0.0)), Err(RenderError::Rejected { .. })));
        s.accept(key);
        assert!(s.draw(&marker(7, 0.0)).is_ok());
    }

    #[test]
    fn removing_highlighted_primitive_clears_highlight() {
        let mut s = HeadlessSurface::new();
        let h = s.draw(&marker(1, 0.0)).unwrap();
        s.set_highlight(Some(h));
        assert_eq!(s.highlighted_key(), Some(PrimitiveKey::Record(RecordId(1))));
        s.remove(h);
        assert_eq!(s.highlight(), None);
    }
}
