use std::collections::BTreeMap;

use catalog::RecordSet;
use foundation::RecordId;
use foundation::math::Vec2;
use tracing::debug;

use crate::cluster::{ClusterId, ClusterSet};
use crate::layer::{
    ClickHandler, Interaction, PrimitiveClick, PrimitiveLedger, RenderDelta, ViewAdapter,
};
use crate::picking::pick_screen;
use crate::surface::{Primitive, PrimitiveHandle, PrimitiveKey, RenderSurface};
use crate::symbology::Symbology;
use crate::viewport::FlatViewport;

/// 2D map adapter. Draws size-1 clusters as markers and larger ones as badges.
pub struct FlatAdapter<S: RenderSurface> {
    surface: S,
    symbology: Symbology,
    ledger: PrimitiveLedger,
    interaction: Interaction,
    // Record -> badge hiding it, from the last render.
    badge_of: BTreeMap<RecordId, ClusterId>,
}

impl<S: RenderSurface> FlatAdapter<S> {
    pub fn new(surface: S, symbology: Symbology) -> Self {
        Self {
            surface,
            symbology,
            ledger: PrimitiveLedger::new(),
            interaction: Interaction::default(),
            badge_of: BTreeMap::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn handle_of(&self, key: PrimitiveKey) -> Option<PrimitiveHandle> {
        self.ledger.handle_of(key)
    }

    /// Primitive under `at` (viewport pixels), if any.
    pub fn pick(&self, viewport: &FlatViewport, at: Vec2) -> Option<PrimitiveClick> {
        pick_screen(self.ledger.primitives(), viewport, at, 0.0).map(|hit| hit.key.into())
    }

    /// Pointer click at `at`: picks and forwards the hit to the click handler.
    pub fn click_at(&mut self, viewport: &FlatViewport, at: Vec2) -> Option<PrimitiveClick> {
        let click = self.pick(viewport, at)?;
        self.interaction.report(click);
        Some(click)
    }

    fn desired(
        &self,
        records: &RecordSet,
        visible: &[RecordId],
        clusters: Option<&ClusterSet>,
    ) -> (BTreeMap<PrimitiveKey, Primitive>, BTreeMap<RecordId, ClusterId>) {
        let mut out = BTreeMap::new();
        let mut badge_of = BTreeMap::new();
        let marker = |id: RecordId| {
            records.get(id).map(|r| Primitive::Marker {
                record: id,
                position: r.position,
                style: self.symbology.marker_style(r.category),
            })
        };

        let Some(clusters) = clusters else {
            for &id in visible {
                if let Some(p) = marker(id) {
                    out.insert(p.key(), p);
                }
            }
            return (out, badge_of);
        };

        for cluster in clusters.iter() {
            if cluster.is_single() {
                if let Some(p) = cluster.members().first().copied().and_then(&marker) {
                    out.insert(p.key(), p);
                }
                continue;
            }
            let p = Primitive::Badge {
                cluster: cluster.id,
                position: cluster.centroid,
                count: cluster.len(),
                style: self.symbology.badge_style(cluster.len()),
            };
            for &m in cluster.members() {
                badge_of.insert(m, cluster.id);
            }
            out.insert(p.key(), p);
        }
        (out, badge_of)
    }

    fn refresh_highlight(&mut self) {
        let target = self.interaction.selected.and_then(|id| {
            self.ledger.handle_of(PrimitiveKey::Record(id)).or_else(|| {
                self.badge_of
                    .get(&id)
                    .and_then(|c| self.ledger.handle_of(PrimitiveKey::Cluster(*c)))
            })
        });
        self.interaction.highlight(&mut self.surface, target);
    }
}

impl<S: RenderSurface> ViewAdapter for FlatAdapter<S> {
    fn render(
        &mut self,
        records: &RecordSet,
        visible: &[RecordId],
        clusters: Option<&ClusterSet>,
    ) -> RenderDelta {
        let (desired, badge_of) = self.desired(records, visible, clusters);
        self.badge_of = badge_of;
        let mut delta = self.ledger.sync(&mut self.surface, desired);
        delta.skipped += clusters.map_or(0, |set| set.skipped().len());
        self.refresh_highlight();
        debug!(?delta, drawn = self.ledger.len(), "flat render");
        delta
    }

    fn clear(&mut self) {
        let removed = self.ledger.clear(&mut self.surface);
        self.badge_of.clear();
        self.interaction.forget_highlight();
        debug!(removed, "flat cleared");
    }

    fn on_primitive_click(&mut self, handler: ClickHandler) {
        self.interaction.set_handler(handler);
    }

    fn set_selected_highlight(&mut self, id: Option<RecordId>) {
        self.interaction.selected = id;
        self.refresh_highlight();
    }

    fn primitive_clicked(&mut self, handle: PrimitiveHandle) -> Option<PrimitiveClick> {
        let click = PrimitiveClick::from(self.ledger.key_of(handle)?);
        self.interaction.report(click);
        Some(click)
    }

    fn drawn(&self) -> Vec<PrimitiveKey> {
        self.ledger.keys()
    }
}
