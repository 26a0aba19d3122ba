use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use catalog::RecordSet;
use foundation::RecordId;
use foundation::math::precision::stable_total_cmp_f64;
use foundation::math::{LatLng, Vec2, wrap_lon_deg};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::surface::RenderError;
use crate::viewport::FlatViewport;

/// Identifies a cluster by its seed, the lowest record id among its members.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u64);

impl ClusterId {
    pub fn seed(self) -> RecordId {
        RecordId(self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Merge radius at `min_zoom`.
    pub radius_px: f64,
    /// Merge radius at `max_zoom`.
    pub min_radius_px: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom increment applied when a badge is clicked below `max_zoom`.
    pub zoom_step: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 80.0,
            min_radius_px: 10.0,
            min_zoom: 0.0,
            max_zoom: 18.0,
            zoom_step: 2.0,
        }
    }
}

impl ClusterConfig {
    /// Pixel merge threshold t(z). Never increases with zoom.
    pub fn merge_radius_px(&self, zoom: f64) -> f64 {
        let hi = self.radius_px.max(self.min_radius_px).max(0.0);
        let lo = self.radius_px.min(self.min_radius_px).max(0.0);
        let span = self.max_zoom - self.min_zoom;
        if span <= 0.0 || span.is_nan() {
            return lo;
        }
        let z = if zoom.is_nan() { self.min_zoom } else { zoom };
        let frac = ((z - self.min_zoom) / span).clamp(0.0, 1.0);
        hi + (lo - hi) * frac
    }

    pub fn is_max_zoom(&self, zoom: f64) -> bool {
        zoom >= self.max_zoom
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Mean coordinate of the members, longitude wrapped into [-180, 180).
    pub centroid: LatLng,
    /// Running screen-space centroid the merge pass compared against.
    pub screen_px: Vec2,
    members: Vec<RecordId>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }

    /// Member ids, ascending.
    pub fn members(&self) -> &[RecordId] {
        &self.members
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.members.binary_search(&id).is_ok()
    }
}

/// Result of one clustering pass, clusters ordered by seed id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
    membership: BTreeMap<RecordId, usize>,
    skipped: Vec<RecordId>,
    zoom: f64,
    radius_px: f64,
}

impl ClusterSet {
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> + '_ {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.clusters[i])
    }

    pub fn cluster_of(&self, record: RecordId) -> Option<&Cluster> {
        self.membership.get(&record).map(|&i| &self.clusters[i])
    }

    /// Records left out because they had no finite projection.
    pub fn skipped(&self) -> &[RecordId] {
        &self.skipped
    }

    pub fn member_count(&self) -> usize {
        self.membership.len()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn radius_px(&self) -> f64 {
        self.radius_px
    }
}

struct Pending {
    id: ClusterId,
    members: Vec<RecordId>,
    screen: Vec2,
    cell: Option<(i64, i64)>,
    lat_sum: f64,
    // Longitudes unwrapped around the seed so antimeridian clusters average sanely.
    lng_sum: f64,
    seed_lng: f64,
}

impl Pending {
    fn seed(id: RecordId, screen: Vec2, position: LatLng, cell: Option<(i64, i64)>) -> Self {
        Self {
            id: ClusterId(id.get()),
            members: vec![id],
            screen,
            cell,
            lat_sum: position.lat,
            lng_sum: position.lng,
            seed_lng: position.lng,
        }
    }

    fn join(&mut self, id: RecordId, screen: Vec2, position: LatLng) {
        self.members.push(id);
        let n = self.members.len() as f64;
        self.screen = self.screen + (screen - self.screen).scale(1.0 / n);
        self.lat_sum += position.lat;
        self.lng_sum += self.seed_lng + wrap_lon_deg(position.lng - self.seed_lng);
    }

    fn finish(self) -> Cluster {
        let n = self.members.len() as f64;
        Cluster {
            id: self.id,
            centroid: LatLng::new(self.lat_sum / n, wrap_lon_deg(self.lng_sum / n)),
            screen_px: self.screen,
            members: self.members,
        }
    }
}

fn cell_of(p: Vec2, cell_px: f64) -> (i64, i64) {
    ((p.x / cell_px).floor() as i64, (p.y / cell_px).floor() as i64)
}

/// Groups the visible records for the flat map at `viewport`.
///
/// Records are taken in ascending id order. Each one joins the nearest
/// existing cluster whose running screen centroid lies within
/// [`ClusterConfig::merge_radius_px`]; on equal distance the older cluster
/// wins. Otherwise it seeds a new cluster. Centroids are bucketed in a grid of
/// cell size t(z), so only the 3x3 neighbourhood of a point is searched.
/// Records in `expanded` always stand alone.
pub fn cluster_records(
    records: &RecordSet,
    visible: &[RecordId],
    viewport: &FlatViewport,
    config: &ClusterConfig,
    expanded: &BTreeSet<RecordId>,
) -> ClusterSet {
    let radius_px = config.merge_radius_px(viewport.zoom);
    let cell_px = radius_px.max(1.0);
    let transform = viewport.transform();

    let mut order: Vec<RecordId> = visible.to_vec();
    order.sort_unstable();
    order.dedup();

    let mut pending: Vec<Pending> = Vec::new();
    let mut grid: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for id in order {
        let Some(record) = records.get(id) else {
            debug!(record = %id, "visible id not in record set; ignored");
            continue;
        };
        let Some(screen) = transform.project(record.position) else {
            let err = RenderError::NonFiniteProjection { record: id };
            warn!(error = %err, "record skipped by clustering");
            skipped.push(id);
            continue;
        };

        if expanded.contains(&id) {
            pending.push(Pending::seed(id, screen, record.position, None));
            continue;
        }

        let (cx, cy) = cell_of(screen, cell_px);
        let mut best: Option<(usize, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(candidates) = grid.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &idx in candidates {
                    let d = pending[idx].screen.distance(screen);
                    if d > radius_px {
                        continue;
                    }
                    let closer = match best {
                        None => true,
                        Some((bi, bd)) => stable_total_cmp_f64(d, bd)
                            .then_with(|| idx.cmp(&bi))
                            .is_lt(),
                    };
                    if closer {
                        best = Some((idx, d));
                    }
                }
            }
        }

        match best {
            Some((idx, _)) => {
                let cluster = &mut pending[idx];
                cluster.join(id, screen, record.position);
                let moved = cell_of(cluster.screen, cell_px);
                if cluster.cell != Some(moved) {
                    if let Some(old) = cluster.cell
                        && let Some(bucket) = grid.get_mut(&old)
                    {
                        bucket.retain(|&i| i != idx);
                    }
                    cluster.cell = Some(moved);
                    grid.entry(moved).or_default().push(idx);
                }
            }
            None => {
                let idx = pending.len();
                pending.push(Pending::seed(id, screen, record.position, Some((cx, cy))));
                grid.entry((cx, cy)).or_default().push(idx);
            }
        }
    }

    let clusters: Vec<Cluster> = pending.into_iter().map(Pending::finish).collect();
    let mut membership = BTreeMap::new();
    for (i, c) in clusters.iter().enumerate() {
        for &m in c.members() {
            membership.insert(m, i);
        }
    }

    debug!(
        zoom = viewport.zoom,
        radius_px,
        clusters = clusters.len(),
        members = membership.len(),
        skipped = skipped.len(),
        "recluster"
    );

    ClusterSet {
        clusters,
        membership,
        skipped,
        zoom: viewport.zoom,
        radius_px,
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterConfig, ClusterId, cluster_records};
    use crate::viewport::FlatViewport;
    use catalog::RecordSet;
    use formats::RawRow;
    use foundation::RecordId;
    use foundation::math::LatLng;
    use std::collections::BTreeSet;

    fn records(points: &[(u64, f64, f64)]) -> RecordSet {
        let rows: Vec<RawRow> = points
            .iter()
            .enumerate()
            .map(|(i, (id, lat, lng))| RawRow {
                line: i + 2,
                id: id.to_string(),
                lat: lat.to_string(),
                lng: lng.to_string(),
                category: "forest".into(),
                ..RawRow::default()
            })
            .collect();
        RecordSet::from_rows(&rows)
    }

    fn all(set: &RecordSet) -> Vec<RecordId> {
        set.ids().collect()
    }

    fn at(zoom: f64) -> FlatViewport {
        FlatViewport::new(LatLng::new(0.0, 0.0), zoom, [1024.0, 768.0])
    }

    fn run(set: &RecordSet, ids: &[RecordId], viewport: &FlatViewport) -> super::ClusterSet {
        cluster_records(set, ids, viewport, &ClusterConfig::default(), &BTreeSet::new())
    }

    fn member_ids(set: &super::ClusterSet) -> Vec<Vec<u64>> {
        set.iter()
            .map(|c| c.members().iter().map(|m| m.get()).collect())
            .collect()
    }

    #[test]
    fn merge_radius_never_grows_with_zoom() {
        let cfg = ClusterConfig::default();
        let mut prev = f64::INFINITY;
        let mut z = -4.0;
        while z <= 24.0 {
            let t = cfg.merge_radius_px(z);
            assert!(t <= prev, "t({z}) = {t} > {prev}");
            prev = t;
            z += 0.25;
        }
        assert_eq!(cfg.merge_radius_px(0.0), 80.0);
        assert_eq!(cfg.merge_radius_px(18.0), 10.0);
    }

    #[test]
    fn inverted_radii_stay_monotone() {
        let cfg = ClusterConfig {
            radius_px: 5.0,
            min_radius_px: 50.0,
            ..ClusterConfig::default()
        };
        assert!(cfg.merge_radius_px(0.0) >= cfg.merge_radius_px(18.0));
    }

    #[test]
    fn nearby_records_merge_at_low_zoom_and_split_when_zoomed_in() {
        let set = records(&[(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 0.0, 40.0)]);
        let cfg = ClusterConfig::default();
        let none = BTreeSet::new();

        let low = cluster_records(&set, &all(&set), &at(2.0), &cfg, &none);
        assert_eq!(member_ids(&low), vec![vec![1, 2], vec![3]]);
        assert_eq!(low.get(ClusterId(1)).map(|c| c.len()), Some(2));

        let high = cluster_records(&set, &all(&set), &at(16.0), &cfg, &none);
        assert_eq!(member_ids(&high), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn cluster_id_is_lowest_member_and_order_is_input_independent() {
        let set = records(&[(9, 0.0, 0.5), (4, 0.0, 0.0), (6, 0.0, 1.0)]);
        let cfg = ClusterConfig::default();
        let none = BTreeSet::new();
        let forward = cluster_records(&set, &all(&set), &at(2.0), &cfg, &none);
        let mut reversed_ids = all(&set);
        reversed_ids.reverse();
        let reversed = cluster_records(&set, &reversed_ids, &at(2.0), &cfg, &none);
        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 1);
        let only = forward.iter().next().unwrap();
        assert_eq!(only.id, ClusterId(4));
        assert_eq!(only.id.seed(), RecordId(4));
        assert_eq!(member_ids(&forward), vec![vec![4, 6, 9]]);
    }

    #[test]
    fn record_joins_nearest_cluster_not_first_in_range() {
        // Both seeds are within t(2) of record 3; seed 2 is closer.
        let set = records(&[(1, 0.0, -20.0), (2, 0.0, 20.0), (3, 0.0, 2.0)]);
        let out = run(&set, &all(&set), &at(2.0));
        assert_eq!(member_ids(&out), vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn antimeridian_neighbours_merge_and_centroid_stays_at_the_seam() {
        let set = records(&[(1, 0.0, 179.5), (2, 0.0, -179.5)]);
        let viewport = FlatViewport::new(LatLng::new(0.0, 180.0), 4.0, [1024.0, 768.0]);
        let out = run(&set, &all(&set), &viewport);
        assert_eq!(out.len(), 1);
        let c = out.iter().next().unwrap();
        assert!((c.centroid.lng.abs() - 180.0).abs() < 1e-9, "centroid {:?}", c.centroid);
        assert!(c.centroid.lat.abs() < 1e-9);
    }

    #[test]
    fn expanded_records_never_merge() {
        let set = records(&[(1, 0.0, 0.0), (2, 0.0, 0.1), (3, 0.0, 0.2)]);
        let expanded = BTreeSet::from([RecordId(1), RecordId(2)]);
        let cfg = ClusterConfig::default();
        let out = cluster_records(&set, &all(&set), &at(2.0), &cfg, &expanded);
        assert_eq!(member_ids(&out), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn membership_lookup_finds_containing_cluster() {
        let set = records(&[(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 0.0, 40.0)]);
        let out = run(&set, &all(&set), &at(2.0));
        assert_eq!(out.cluster_of(RecordId(2)).map(|c| c.id), Some(ClusterId(1)));
        assert_eq!(out.cluster_of(RecordId(3)).map(|c| c.id), Some(ClusterId(3)));
        assert!(out.cluster_of(RecordId(99)).is_none());
        assert_eq!(out.member_count(), 3);
    }

    #[test]
    fn only_visible_ids_are_clustered() {
        let set = records(&[(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 0.0, 2.0)]);
        let out = run(&set, &[RecordId(1), RecordId(3)], &at(2.0));
        assert_eq!(member_ids(&out), vec![vec![1, 3]]);
    }

    #[test]
    fn non_finite_projection_is_skipped() {
        let set = records(&[(1, 10.0, 10.0)]);
        let out = run(&set, &all(&set), &at(5000.0));
        assert!(out.is_empty());
        assert_eq!(out.skipped(), &[RecordId(1)]);
    }
}
