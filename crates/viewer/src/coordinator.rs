use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use catalog::{
    FacetCounts, FetchError, FilterDelta, FilterEngine, FilterState, LoadResult, Record,
    RecordSet, RecordStore,
};
use foundation::RecordId;
use layers::{
    ClickHandler, ClusterId, ClusterSet, FlatViewport, PrimitiveClick, PrimitiveHandle,
    RenderDelta, ViewAdapter, cluster_records,
};
use runtime::{EventBus, Inbox, Ticket};
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::state::{CoordinatorEvent, Phase, SelectionState, Transition, ViewMode};

fn click_sink(inbox: &Inbox<Transition>) -> ClickHandler {
    let inbox = inbox.clone();
    Box::new(move |click| {
        inbox.push(Transition::PrimitiveClick(click));
    })
}

/// Single owner of view mode, filter state and selection.
///
/// Key properties:
/// - Every change goes through a [`Transition`]. Transitions are queued in an
///   [`Inbox`] and handled one at a time, oldest first. Clicks an adapter
///   reports while a transition is running are handled after it.
/// - Only the active adapter is rendered. The outgoing adapter is cleared on a
///   view switch and redrawn from scratch when it becomes active again.
/// - A selection that is no longer visible is dropped.
/// - Until the dataset is loaded nothing but viewport reports is accepted.
///   After a failed load only [`Transition::RetryLoad`] is.
pub struct Coordinator<F: ViewAdapter, G: ViewAdapter> {
    config: ViewerConfig,
    flat: F,
    globe: G,
    inbox: Inbox<Transition>,
    events: EventBus<CoordinatorEvent>,
    phase: Phase,
    mode: ViewMode,
    filter: FilterEngine,
    selection: SelectionState,
    records: Option<Arc<RecordSet>>,
    visible: Arc<[RecordId]>,
    clusters: Option<ClusterSet>,
    viewport: FlatViewport,
    // Members of badges clicked at max zoom. Reset on any viewport or filter change.
    expanded: BTreeSet<RecordId>,
    last_render: RenderDelta,
}

impl<F: ViewAdapter, G: ViewAdapter> Coordinator<F, G> {
    pub fn new(config: ViewerConfig, mut flat: F, mut globe: G) -> Self {
        let inbox = Inbox::new();
        flat.on_primitive_click(click_sink(&inbox));
        globe.on_primitive_click(click_sink(&inbox));
        let viewport = config
            .viewport
            .normalized(config.clustering.min_zoom, config.clustering.max_zoom);
        Self {
            mode: config.default_view,
            config,
            flat,
            globe,
            inbox,
            events: EventBus::new(),
            phase: Phase::Loading,
            filter: FilterEngine::new(),
            selection: SelectionState::None,
            records: None,
            visible: Arc::from(Vec::new()),
            clusters: None,
            viewport,
            expanded: BTreeSet::new(),
            last_render: RenderDelta::default(),
        }
    }

    // ---- loading ----------------------------------------------------------

    /// True while a dataset load is expected. Hosts that cannot hold `&mut`
    /// across an await call this, drive [`RecordStore::load`] themselves and
    /// hand the outcome to [`Coordinator::finish_load`].
    pub fn begin_load(&self) -> bool {
        let loading = matches!(self.phase, Phase::Loading);
        if !loading {
            debug!(phase = ?self.phase, "load not expected in this phase");
        }
        loading
    }

    /// Loads the dataset through `store` and applies the outcome.
    pub async fn load<Fe, Fut>(&mut self, store: &RecordStore, fetch: Fe)
    where
        Fe: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FetchError>> + 'static,
    {
        if !self.begin_load() {
            return;
        }
        let result = store.load(fetch).await;
        self.finish_load(result);
    }

    pub fn finish_load(&mut self, result: LoadResult) {
        if !matches!(self.phase, Phase::Loading) {
            warn!("load result arrived outside the loading phase; ignored");
            return;
        }
        // Anything queued before the outcome is settled under Loading rules.
        let stale = self.pump();
        if stale > 0 {
            debug!(stale, "transitions queued during load settled before ready");
        }
        match result {
            Ok(records) => {
                let count = records.len();
                let rejected = records.rejections().len();
                self.records = Some(records);
                self.phase = Phase::Ready;
                self.selection = SelectionState::None;
                self.expanded.clear();
                self.recompute_visible();
                self.render_active();
                info!(records = count, rejected, view = self.mode.as_str(), "viewer ready");
                self.events.emit(CoordinatorEvent::Ready {
                    records: count,
                    rejected,
                });
            }
            Err(e) => {
                warn!(error = %e, "dataset unavailable; viewer degraded");
                self.records = None;
                self.visible = Arc::from(Vec::new());
                self.clusters = None;
                self.selection = SelectionState::None;
                self.expanded.clear();
                self.flat.clear();
                self.globe.clear();
                self.last_render = RenderDelta::default();
                self.phase = Phase::Degraded(e.clone());
                self.events.emit(CoordinatorEvent::LoadFailed(e));
            }
        }
        self.pump();
    }

    // ---- transitions ------------------------------------------------------

    /// Queues `transition` and handles everything pending, oldest first.
    pub fn dispatch(&mut self, transition: Transition) {
        self.inbox.push(transition);
        self.pump();
    }

    /// Handles every queued transition. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some((ticket, transition)) = self.inbox.pop_next() {
            self.handle(ticket, transition);
            handled += 1;
        }
        handled
    }

    pub fn switch_view(&mut self, mode: ViewMode) {
        self.dispatch(Transition::SwitchView(mode));
    }

    pub fn apply_filter(&mut self, delta: FilterDelta) {
        self.dispatch(Transition::ApplyFilter(delta));
    }

    pub fn on_primitive_click(&mut self, click: PrimitiveClick) {
        self.dispatch(Transition::PrimitiveClick(click));
    }

    pub fn dismiss_selection(&mut self) {
        self.dispatch(Transition::DismissSelection);
    }

    pub fn set_viewport(&mut self, viewport: FlatViewport) {
        self.dispatch(Transition::SetViewport(viewport));
    }

    pub fn retry_load(&mut self) {
        self.dispatch(Transition::RetryLoad);
    }

    /// Engine callback for a click on `handle` in the active view.
    pub fn engine_click(&mut self, handle: PrimitiveHandle) -> Option<PrimitiveClick> {
        let click = self.active_mut().primitive_clicked(handle);
        self.pump();
        click
    }

    /// Re-renders the active view with unchanged input, e.g. after the host
    /// recreated the engine surface. Returns the applied delta.
    pub fn refresh(&mut self) -> RenderDelta {
        if !matches!(self.phase, Phase::Ready) {
            return RenderDelta::default();
        }
        self.render_active()
    }

    fn handle(&mut self, ticket: Ticket, transition: Transition) {
        debug!(ticket = ticket.0, ?transition, "transition");
        let ready = matches!(self.phase, Phase::Ready);
        let degraded = matches!(self.phase, Phase::Degraded(_));
        match transition {
            Transition::SetViewport(viewport) => self.viewport_changed(viewport),
            Transition::RetryLoad if degraded => {
                info!("dataset load retry requested");
                self.phase = Phase::Loading;
            }
            t if !ready => debug!(transition = ?t, phase = ?self.phase, "ignored"),
            Transition::SwitchView(mode) => self.view_switched(mode),
            Transition::ApplyFilter(delta) => self.filter_changed(delta),
            Transition::PrimitiveClick(PrimitiveClick::Record(id)) => self.select(id),
            Transition::PrimitiveClick(PrimitiveClick::Cluster(id)) => self.cluster_clicked(id),
            Transition::DismissSelection => self.dismiss(),
            Transition::RetryLoad => debug!("retry ignored; dataset already loaded"),
        }
    }

    fn view_switched(&mut self, mode: ViewMode) {
        if mode == self.mode {
            return;
        }
        self.active_mut().clear();
        self.mode = mode;
        self.drop_hidden_selection();
        let delta = self.render_active();
        debug!(view = mode.as_str(), ?delta, "view switched");
        self.events.emit(CoordinatorEvent::ViewSwitched(mode));
    }

    fn filter_changed(&mut self, delta: FilterDelta) {
        if !self.filter.apply(delta) {
            debug!("filter unchanged");
            return;
        }
        self.recompute_visible();
        self.expanded.clear();
        self.drop_hidden_selection();
        self.render_active();
        self.events.emit(CoordinatorEvent::FilterApplied {
            visible: self.visible.len(),
        });
    }

    fn select(&mut self, id: RecordId) {
        if !self.is_visible(id) {
            debug!(record = %id, "click on a record outside the visible set; ignored");
            return;
        }
        if self.selection.is_selected(id) {
            return;
        }
        self.selection = SelectionState::Selected(id);
        self.active_mut().set_selected_highlight(Some(id));
        self.events.emit(CoordinatorEvent::DetailShown(id));
    }

    fn cluster_clicked(&mut self, id: ClusterId) {
        if self.mode != ViewMode::Flat {
            return;
        }
        let Some(cluster) = self.clusters.as_ref().and_then(|set| set.get(id)) else {
            debug!(cluster = %id, "click on a stale cluster; ignored");
            return;
        };
        if cluster.is_single() {
            if let Some(&only) = cluster.members().first() {
                self.select(only);
            }
            return;
        }
        let centroid = cluster.centroid;
        let members = cluster.members().to_vec();
        let cfg = self.config.clustering;

        if cfg.is_max_zoom(self.viewport.zoom) {
            self.expanded.extend(members.iter().copied());
            self.render_active();
            self.events.emit(CoordinatorEvent::ClusterExpanded {
                cluster: id,
                members: members.len(),
            });
        } else {
            let zoom = (self.viewport.zoom + cfg.zoom_step).min(cfg.max_zoom);
            self.viewport = self
                .viewport
                .looking_at(centroid, zoom)
                .normalized(cfg.min_zoom, cfg.max_zoom);
            self.expanded.clear();
            self.render_active();
            self.events.emit(CoordinatorEvent::ClusterZoomed {
                cluster: id,
                zoom: self.viewport.zoom,
            });
        }
    }

    fn dismiss(&mut self) {
        if self.selection == SelectionState::None {
            return;
        }
        self.selection = SelectionState::None;
        self.active_mut().set_selected_highlight(None);
        self.events.emit(CoordinatorEvent::DetailHidden);
    }

    fn viewport_changed(&mut self, viewport: FlatViewport) {
        let cfg = self.config.clustering;
        let viewport = viewport.normalized(cfg.min_zoom, cfg.max_zoom);
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.expanded.clear();
        if matches!(self.phase, Phase::Ready) && self.mode == ViewMode::Flat {
            self.render_active();
        }
    }

    // ---- helpers ----------------------------------------------------------

    fn active_mut(&mut self) -> &mut dyn ViewAdapter {
        match self.mode {
            ViewMode::Flat => &mut self.flat,
            ViewMode::Globe => &mut self.globe,
        }
    }

    fn is_visible(&self, id: RecordId) -> bool {
        self.visible.binary_search(&id).is_ok()
    }

    fn recompute_visible(&mut self) {
        if let Some(records) = &self.records {
            self.visible = self.filter.refresh(records);
        }
    }

    fn drop_hidden_selection(&mut self) {
        if let Some(id) = self.selection.record()
            && !self.is_visible(id)
        {
            debug!(record = %id, "selection no longer visible; cleared");
            self.selection = SelectionState::None;
            self.events.emit(CoordinatorEvent::DetailHidden);
        }
    }

    fn render_active(&mut self) -> RenderDelta {
        let Some(records) = self.records.clone() else {
            return RenderDelta::default();
        };
        let selected = self.selection.record();
        let delta = match self.mode {
            ViewMode::Flat => {
                let clusters = cluster_records(
                    &records,
                    &self.visible,
                    &self.viewport,
                    &self.config.clustering,
                    &self.expanded,
                );
                let delta = self.flat.render(&records, &self.visible, Some(&clusters));
                self.flat.set_selected_highlight(selected);
                self.clusters = Some(clusters);
                delta
            }
            ViewMode::Globe => {
                self.clusters = None;
                let delta = self.globe.render(&records, &self.visible, None);
                self.globe.set_selected_highlight(selected);
                delta
            }
        };
        self.last_render = delta;
        delta
    }

    // ---- accessors --------------------------------------------------------

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn view_mode(&self) -> ViewMode {
        self.mode
    }

    pub fn filter_state(&self) -> &FilterState {
        self.filter.state()
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn selected_record(&self) -> Option<&Record> {
        let id = self.selection.record()?;
        self.records.as_ref()?.get(id)
    }

    /// Visible record ids, ascending.
    pub fn visible_ids(&self) -> &[RecordId] {
        &self.visible
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Clusters of the last flat render. `None` while the globe is active.
    pub fn clusters(&self) -> Option<&ClusterSet> {
        self.clusters.as_ref()
    }

    pub fn viewport(&self) -> &FlatViewport {
        &self.viewport
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.phase, Phase::Ready)
    }

    pub fn facet_counts(&self) -> FacetCounts {
        match &self.records {
            Some(records) => self.filter.facet_counts(records),
            None => FacetCounts::default(),
        }
    }

    pub fn records(&self) -> Option<&Arc<RecordSet>> {
        self.records.as_ref()
    }

    pub fn last_render(&self) -> RenderDelta {
        self.last_render
    }

    /// Handle for hosts that queue transitions from outside (UI callbacks).
    pub fn inbox(&self) -> Inbox<Transition> {
        self.inbox.clone()
    }

    pub fn events(&self) -> &EventBus<CoordinatorEvent> {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<CoordinatorEvent> {
        self.events.drain().into_iter().map(|s| s.event).collect()
    }

    pub fn flat(&self) -> &F {
        &self.flat
    }

    pub fn flat_mut(&mut self) -> &mut F {
        &mut self.flat
    }

    pub fn globe(&self) -> &G {
        &self.globe
    }

    pub fn globe_mut(&mut self) -> &mut G {
        &mut self.globe
    }
}
