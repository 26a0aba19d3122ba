use std::collections::BTreeMap;

use catalog::RecordSet;
use foundation::RecordId;
use foundation::math::{WGS84_A, geodetic_to_ecef};
use tracing::{debug, warn};

use crate::cluster::ClusterSet;
use crate::layer::{
    ClickHandler, Interaction, PrimitiveClick, PrimitiveLedger, RenderDelta, ViewAdapter,
};
use crate::surface::{Primitive, PrimitiveHandle, PrimitiveKey, RenderError, RenderSurface};
use crate::symbology::Symbology;

/// 3D globe adapter. One lifted point per visible record, no clustering.
pub struct GlobeAdapter<S: RenderSurface> {
    surface: S,
    symbology: Symbology,
    ledger: PrimitiveLedger,
    interaction: Interaction,
}

impl<S: RenderSurface> GlobeAdapter<S> {
    pub fn new(surface: S, symbology: Symbology) -> Self {
        Self {
            surface,
            symbology,
            ledger: PrimitiveLedger::new(),
            interaction: Interaction::default(),
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

    fn refresh_highlight(&mut self) {
        let target = self
            .interaction
            .selected
            .and_then(|id| self.ledger.handle_of(PrimitiveKey::Record(id)));
        self.interaction.highlight(&mut self.surface, target);
    }
}

impl<S: RenderSurface> ViewAdapter for GlobeAdapter<S> {
    /// Cluster sets are flat-map only and ignored here.
    fn render(
        &mut self,
        records: &RecordSet,
        visible: &[RecordId],
        _clusters: Option<&ClusterSet>,
    ) -> RenderDelta {
        let mut desired = BTreeMap::new();
        let mut unprojectable = 0;
        for &id in visible {
            let Some(record) = records.get(id) else {
                continue;
            };
            let style = self.symbology.globe_style(record.category);
            let lift_m = f64::from(style.lift) * WGS84_A;
            let position = geodetic_to_ecef(record.position.to_geodetic(lift_m));
            if !position.is_finite() {
                let err = RenderError::NonFiniteProjection { record: id };
                warn!(error = %err, "globe point skipped");
                unprojectable += 1;
                continue;
            }
            let p = Primitive::Point {
                record: id,
                position,
                style,
            };
            desired.insert(p.key(), p);
        }

        let mut delta = self.ledger.sync(&mut self.surface, desired);
        delta.skipped += unprojectable;
        self.refresh_highlight();
        debug!(?delta, drawn = self.ledger.len(), "globe render");
        delta
    }

    fn clear(&mut self) {
        let removed = self.ledger.clear(&mut self.surface);
        self.interaction.forget_highlight();
        debug!(removed, "globe cleared");
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
