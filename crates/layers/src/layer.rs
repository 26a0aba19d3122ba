use std::collections::BTreeMap;

use catalog::RecordSet;
use foundation::RecordId;
use tracing::warn;

use crate::cluster::{ClusterId, ClusterSet};
use crate::surface::{Primitive, PrimitiveHandle, PrimitiveKey, RenderSurface};

/// What the user hit, as reported upward by an adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveClick {
    Record(RecordId),
    Cluster(ClusterId),
}

impl From<PrimitiveKey> for PrimitiveClick {
    fn from(key: PrimitiveKey) -> Self {
        match key {
            PrimitiveKey::Record(id) => PrimitiveClick::Record(id),
            PrimitiveKey::Cluster(id) => PrimitiveClick::Cluster(id),
        }
    }
}

pub type ClickHandler = Box<dyn FnMut(PrimitiveClick)>;

/// Outcome of one render pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RenderDelta {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Primitives the engine refused this pass. Not recorded as drawn.
    pub skipped: usize,
}

impl RenderDelta {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// Capability set every view presents to the coordinator.
///
/// Data flows down through `render`; clicks flow up through the handler
/// registered with `on_primitive_click`. Adapters never write shared state.
pub trait ViewAdapter {
    /// Brings the drawn primitives in line with `visible`. Only the difference
    /// against what is currently drawn is applied.
    fn render(
        &mut self,
        records: &RecordSet,
        visible: &[RecordId],
        clusters: Option<&ClusterSet>,
    ) -> RenderDelta;

    /// Removes every primitive this adapter has drawn.
    fn clear(&mut self);

    fn on_primitive_click(&mut self, handler: ClickHandler);

    fn set_selected_highlight(&mut self, id: Option<RecordId>);

    /// Engine callback: maps `handle` back to what it shows and forwards the
    /// click to the registered handler.
    fn primitive_clicked(&mut self, handle: PrimitiveHandle) -> Option<PrimitiveClick>;

    /// Keys currently drawn, ascending.
    fn drawn(&self) -> Vec<PrimitiveKey>;
}

struct Drawn {
    handle: PrimitiveHandle,
    primitive: Primitive,
}

/// Book of what an adapter has on its surface, keyed by primitive identity.
#[derive(Default)]
pub struct PrimitiveLedger {
    drawn: BTreeMap<PrimitiveKey, Drawn>,
    by_handle: BTreeMap<PrimitiveHandle, PrimitiveKey>,
}

impl PrimitiveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the difference between what is drawn and `desired`.
    ///
    /// A primitive whose content changed (badge count or centroid, colour) is
    /// removed and drawn again. A draw failure is logged and the primitive is
    /// left out of the ledger so the next pass retries it.
    pub fn sync<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        desired: BTreeMap<PrimitiveKey, Primitive>,
    ) -> RenderDelta {
        let mut delta = RenderDelta::default();

        let stale: Vec<PrimitiveKey> = self
            .drawn
            .keys()
            .filter(|k| !desired.contains_key(k))
            .copied()
            .collect();
        for key in stale {
            if let Some(old) = self.drawn.remove(&key) {
                self.by_handle.remove(&old.handle);
                surface.remove(old.handle);
                delta.removed += 1;
            }
        }

        for (key, primitive) in desired {
            let replacing = match self.drawn.get(&key) {
                Some(existing) if existing.primitive == primitive => {
                    delta.unchanged += 1;
                    continue;
                }
                Some(_) => true,
                None => false,
            };
            if replacing && let Some(old) = self.drawn.remove(&key) {
                self.by_handle.remove(&old.handle);
                surface.remove(old.handle);
            }
            match surface.draw(&primitive) {
                Ok(handle) => {
                    self.drawn.insert(key, Drawn { handle, primitive });
                    self.by_handle.insert(handle, key);
                    if replacing {
                        delta.updated += 1;
                    } else {
                        delta.added += 1;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "primitive skipped");
                    if replacing {
                        delta.removed += 1;
                    }
                    delta.skipped += 1;
                }
            }
        }

        delta
    }

    /// Removes everything. Returns how many primitives were removed.
    pub fn clear<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        let n = self.drawn.len();
        for (_, d) in std::mem::take(&mut self.drawn) {
            surface.remove(d.handle);
        }
        self.by_handle.clear();
        n
    }

    pub fn handle_of(&self, key: PrimitiveKey) -> Option<PrimitiveHandle> {
        self.drawn.get(&key).map(|d| d.handle)
    }

    pub fn key_of(&self, handle: PrimitiveHandle) -> Option<PrimitiveKey> {
        self.by_handle.get(&handle).copied()
    }

    pub fn keys(&self) -> Vec<PrimitiveKey> {
        self.drawn.keys().copied().collect()
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> + '_ {
        self.drawn.values().map(|d| &d.primitive)
    }

    pub fn len(&self) -> usize {
        self.drawn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }
}

/// Click plumbing and highlight bookkeeping shared by both adapters.
#[derive(Default)]
pub(crate) struct Interaction {
    handler: Option<ClickHandler>,
    pub(crate) selected: Option<RecordId>,
    highlighted: Option<PrimitiveHandle>,
}

impl Interaction {
    pub(crate) fn set_handler(&mut self, handler: ClickHandler) {
        self.handler = Some(handler);
    }

    pub(crate) fn report(&mut self, click: PrimitiveClick) {
        if let Some(handler) = self.handler.as_mut() {
            handler(click);
        }
    }

    /// Pushes `target` to the surface if it differs from the last highlight.
    pub(crate) fn highlight<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        target: Option<PrimitiveHandle>,
    ) {
        if self.highlighted != target {
            surface.set_highlight(target);
            self.highlighted = target;
        }
    }

    pub(crate) fn forget_highlight(&mut self) {
        self.highlighted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{PrimitiveClick, PrimitiveLedger, RenderDelta};
    use crate::cluster::ClusterId;
    use crate::surface::{HeadlessSurface, Primitive, PrimitiveKey};
    use crate::symbology::MarkerStyle;
    use foundation::RecordId;
    use foundation::math::LatLng;
    use std::collections::BTreeMap;

    fn marker(id: u64) -> Primitive {
        Primitive::Marker {
            record: RecordId(id),
            position: LatLng::new(0.0, id as f64),
            style: MarkerStyle::default(),
        }
    }

    fn badge(id: u64, count: usize) -> Primitive {
        Primitive::Badge {
            cluster: ClusterId(id),
            position: LatLng::new(1.0, 1.0),
            count,
            style: MarkerStyle::default(),
        }
    }

    fn desired(items: &[Primitive]) -> BTreeMap<PrimitiveKey, Primitive> {
        items.iter().map(|p| (p.key(), *p)).collect()
    }

    #[test]
    fn identical_input_is_a_noop() {
        let mut surface = HeadlessSurface::new();
        let mut ledger = PrimitiveLedger::new();
        let items = [marker(1), marker(2), badge(3, 4)];
        let first = ledger.sync(&mut surface, desired(&items));
        assert_eq!(first.added, 3);
        let draws = surface.draw_calls();

        let second = ledger.sync(&mut surface, desired(&items));
        assert!(second.is_noop());
        assert_eq!(second.unchanged, 3);
        assert_eq!(surface.draw_calls(), draws);
    }

    #[test]
    fn changed_badge_is_replaced() {
        let mut surface = HeadlessSurface::new();
        let mut ledger = PrimitiveLedger::new();
        ledger.sync(&mut surface, desired(&[badge(3, 4)]));
        let before = ledger.handle_of(PrimitiveKey::Cluster(ClusterId(3)));

        let delta = ledger.sync(&mut surface, desired(&[badge(3, 5)]));
        assert_eq!(
            delta,
            RenderDelta {
                updated: 1,
                ..RenderDelta::default()
            }
        );
        assert_ne!(ledger.handle_of(PrimitiveKey::Cluster(ClusterId(3))), before);
        assert_eq!(surface.live_count(), 1);
    }

    #[test]
    fn stale_primitives_are_removed() {
        let mut surface = HeadlessSurface::new();
        let mut ledger = PrimitiveLedger::new();
        ledger.sync(&mut surface, desired(&[marker(1), marker(2)]));
        let delta = ledger.sync(&mut surface, desired(&[marker(2)]));
        assert_eq!((delta.removed, delta.unchanged), (1, 1));
        assert_eq!(surface.live_keys(), vec![PrimitiveKey::Record(RecordId(2))]);
    }

    #[test]
    fn refused_primitive_is_not_recorded_and_retried() {
        let mut surface = HeadlessSurface::new();
        let mut ledger = PrimitiveLedger::new();
        let key = PrimitiveKey::Record(RecordId(2));
        surface.refuse(key);

        let first = ledger.sync(&mut surface, desired(&[marker(1), marker(2)]));
        assert_eq!((first.added, first.skipped), (1, 1));
        assert_eq!(ledger.keys(), vec![PrimitiveKey::Record(RecordId(1))]);

        surface.accept(key);
        let second = ledger.sync(&mut surface, desired(&[marker(1), marker(2)]));
        assert_eq!((second.added, second.unchanged), (1, 1));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn handles_map_back_to_keys() {
        let mut surface = HeadlessSurface::new();
        let mut ledger = PrimitiveLedger::new();
        ledger.sync(&mut surface, desired(&[marker(1), badge(5, 2)]));
        let h = ledger.handle_of(PrimitiveKey::Cluster(ClusterId(5))).unwrap();
        assert_eq!(ledger.key_of(h), Some(PrimitiveKey::Cluster(ClusterId(5))));
        assert_eq!(
            PrimitiveClick::from(PrimitiveKey::Cluster(ClusterId(5))),
            PrimitiveClick::Cluster(ClusterId(5))
        );
    }

    #[test]
    fn clear_empties_surface() {
        let mut surface = HeadlessSurface::new();
        let mut ledger = PrimitiveLedger::new();
        ledger.sync(&mut surface, desired(&[marker(1), marker(2)]));
        assert_eq!(ledger.clear(&mut surface), 2);
        assert!(ledger.is_empty());
        assert_eq!(surface.live_count(), 0);
    }
}
