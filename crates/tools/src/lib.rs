//! Library side of the `atlas` command. Reports are produced by running the
//! real coordinator against headless surfaces, so what the CLI prints is what
//! a map host would draw.

use std::fmt::Write as _;

use catalog::{FilterDelta, FilterState, LoadError, RecordSet, RecordStore};
use foundation::math::LatLng;
use layers::{FlatAdapter, GlobeAdapter, HeadlessSurface, Primitive};
use serde::Serialize;
use viewer::{Coordinator, Phase, ViewMode, ViewerConfig};

#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    pub filter: FilterState,
    pub zoom: Option<f64>,
    pub center: Option<LatLng>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: u64,
    pub count: usize,
    /// `[lat, lng]`
    pub centroid: [f64; 2],
    pub members: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub records: usize,
    pub rejected: usize,
    pub filter: FilterState,
    pub visible: Vec<u64>,
    pub zoom: f64,
    /// `[lat, lng]`
    pub center: [f64; 2],
    pub merge_radius_px: f64,
    pub clusters: Vec<ClusterSummary>,
    pub markers: usize,
    pub badges: usize,
    pub skipped: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionSummary {
    pub line: usize,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub records: usize,
    pub rejections: Vec<RejectionSummary>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Parses `"LAT,LNG"` in decimal degrees.
pub fn parse_center(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("latitude is not a number: {lat:?}"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("longitude is not a number: {lng:?}"))?;
    let p = LatLng::new(lat, lng);
    if !p.is_valid() {
        return Err(format!("coordinate out of range: {lat},{lng}"));
    }
    Ok(p)
}

pub fn validate(text: &str) -> Result<ValidationReport, LoadError> {
    let set = RecordSet::parse(text)?;
    let rejections = set
        .rejections()
        .iter()
        .map(|r| RejectionSummary {
            line: r.line,
            id: r.raw_id.clone(),
            reason: r.error.to_string(),
        })
        .collect();
    Ok(ValidationReport {
        records: set.len(),
        rejections,
    })
}

/// Loads `text`, applies the filter and viewport from `options` and reports
/// the flat view as the coordinator leaves it.
pub fn inspect(
    text: String,
    mut config: ViewerConfig,
    options: &InspectOptions,
) -> Result<InspectReport, LoadError> {
    config.default_view = ViewMode::Flat;
    let symbology = config.symbology.clone();
    let mut coordinator = Coordinator::new(
        config,
        FlatAdapter::new(HeadlessSurface::new(), symbology.clone()),
        GlobeAdapter::new(HeadlessSurface::new(), symbology),
    );
    let store = RecordStore::new();
    pollster::block_on(coordinator.load(&store, move || std::future::ready(Ok(text))));
    if let Phase::Degraded(e) = coordinator.phase() {
        return Err(e.clone());
    }

    coordinator.apply_filter(FilterDelta::SetCategories(options.filter.categories.clone()));
    coordinator.apply_filter(FilterDelta::SetClimateImpacts(
        options.filter.climate_impacts.clone(),
    ));
    if options.zoom.is_some() || options.center.is_some() {
        let current = *coordinator.viewport();
        let center = options.center.unwrap_or_else(|| current.center());
        let zoom = options.zoom.unwrap_or(current.zoom);
        coordinator.set_viewport(current.looking_at(center, zoom));
    }

    let (records, rejected) = coordinator
        .records()
        .map(|set| (set.len(), set.rejections().len()))
        .unwrap_or_default();
    let viewport = *coordinator.viewport();
    let (clusters, merge_radius_px, skipped) = match coordinator.clusters() {
        Some(set) => (
            set.iter()
                .map(|c| ClusterSummary {
                    id: c.id.0,
                    count: c.len(),
                    centroid: [c.centroid.lat, c.centroid.lng],
                    members: c.members().iter().map(|m| m.get()).collect(),
                })
                .collect(),
            set.radius_px(),
            set.skipped().iter().map(|id| id.get()).collect(),
        ),
        None => (Vec::new(), 0.0, Vec::new()),
    };
    let (mut markers, mut badges) = (0, 0);
    for (_, primitive) in coordinator.flat().surface().live() {
        match primitive {
            Primitive::Badge { .. } => badges += 1,
            _ => markers += 1,
        }
    }

    Ok(InspectReport {
        records,
        rejected,
        filter: coordinator.filter_state().clone(),
        visible: coordinator.visible_ids().iter().map(|id| id.get()).collect(),
        zoom: viewport.zoom,
        center: [viewport.center_lat_deg, viewport.center_lng_deg],
        merge_radius_px,
        clusters,
        markers,
        badges,
        skipped,
    })
}

pub fn render_inspect_text(report: &InspectReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "records: {} ({} rejected)",
        report.records, report.rejected
    );
    let categories: Vec<&str> = report.filter.categories.iter().map(|c| c.as_str()).collect();
    let impacts: Vec<&str> = report
        .filter
        .climate_impacts
        .iter()
        .map(|i| i.as_str())
        .collect();
    let _ = writeln!(
        out,
        "filter: categories=[{}] impacts=[{}]",
        categories.join(","),
        impacts.join(",")
    );
    let _ = writeln!(out, "visible: {}", report.visible.len());
    let _ = writeln!(
        out,
        "view: zoom {:.2} at {:.4},{:.4} (merge radius {:.1}px)",
        report.zoom, report.center[0], report.center[1], report.merge_radius_px
    );
    let _ = writeln!(
        out,
        "drawn: {} markers, {} badges",
        report.markers, report.badges
    );
    for c in &report.clusters {
        let members: Vec<String> = c.members.iter().map(|m| m.to_string()).collect();
        let _ = writeln!(
            out,
            "  cluster #{} x{} at {:.4},{:.4}: {}",
            c.id,
            c.count,
            c.centroid[0],
            c.centroid[1],
            members.join(" ")
        );
    }
    if !report.skipped.is_empty() {
        let _ = writeln!(out, "skipped (no finite projection): {:?}", report.skipped);
    }
    out
}

pub fn render_validation_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} valid records, {} rejected rows",
        report.records,
        report.rejections.len()
    );
    for r in &report.rejections {
        let _ = writeln!(out, "  line {} (id {:?}): {}", r.line, r.id, r.reason);
    }
    out
}
