use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use formats::{DatasetFormat, RawRow, parse_rows};
use foundation::RecordId;
use foundation::math::LatLng;
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;
use tracing::{debug, info, warn};

use crate::error::{LoadError, ValidationError};

/// Ecosystem a restoration case belongs to. Closed set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Forest,
    Grassland,
    Wetland,
    Freshwater,
    Marine,
    Coastal,
    Dryland,
    Mountain,
    Agricultural,
    Urban,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Forest,
        Category::Grassland,
        Category::Wetland,
        Category::Freshwater,
        Category::Marine,
        Category::Coastal,
        Category::Dryland,
        Category::Mountain,
        Category::Agricultural,
        Category::Urban,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Forest => "forest",
            Category::Grassland => "grassland",
            Category::Wetland => "wetland",
            Category::Freshwater => "freshwater",
            Category::Marine => "marine",
            Category::Coastal => "coastal",
            Category::Dryland => "dryland",
            Category::Mountain => "mountain",
            Category::Agricultural => "agricultural",
            Category::Urban => "urban",
        }
    }

    /// Case-insensitive; spaces and hyphens are ignored (`"Fresh-water"`).
    pub fn parse(raw: &str) -> Option<Self> {
        let key = normalize_label(raw).replace('_', "");
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

/// Kind of climate benefit a case reports. Closed set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateImpact {
    Mitigation,
    Adaptation,
    MitigationAndAdaptation,
}

impl ClimateImpact {
    pub const ALL: [ClimateImpact; 3] = [
        ClimateImpact::Mitigation,
        ClimateImpact::Adaptation,
        ClimateImpact::MitigationAndAdaptation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClimateImpact::Mitigation => "mitigation",
            ClimateImpact::Adaptation => "adaptation",
            ClimateImpact::MitigationAndAdaptation => "mitigation_and_adaptation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = normalize_label(raw).replace("_&_", "_and_");
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .split([' ', '-', '_'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Publication date as written in the dataset, plus the calendar date when it
/// parses as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublicationDate {
    pub raw: String,
    pub date: Option<Date>,
}

impl PublicationDate {
    pub fn parse(raw: &str) -> Self {
        let fmt = format_description!("[year]-[month]-[day]");
        let date = Date::parse(raw, fmt).ok();
        if date.is_none() && !raw.is_empty() {
            debug!(raw, "publication date is not YYYY-MM-DD; keeping raw text");
        }
        Self {
            raw: raw.to_string(),
            date,
        }
    }
}

/// One restoration case. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub position: LatLng,
    pub category: Category,
    pub climate_impact: Option<ClimateImpact>,
    pub published: PublicationDate,
    pub source: String,
    pub url: String,
}

impl Record {
    pub fn from_raw(row: &RawRow) -> Result<Self, ValidationError> {
        let id = parse_id(&row.id)?;
        let lat = parse_number("lat", &row.lat)?;
        let lng = parse_number("lng", &row.lng)?;
        let position = LatLng::new(lat, lng);
        if !position.is_valid() {
            return Err(ValidationError::CoordinateOutOfRange { lat, lng });
        }

        if row.category.is_empty() {
            return Err(ValidationError::MissingField("category"));
        }
        let category = Category::parse(&row.category)
            .ok_or_else(|| ValidationError::UnknownCategory(row.category.clone()))?;

        let climate_impact = match row.climate_impact.as_str() {
            "" => None,
            raw => Some(
                ClimateImpact::parse(raw)
                    .ok_or_else(|| ValidationError::UnknownClimateImpact(raw.to_string()))?,
            ),
        };

        Ok(Record {
            id,
            title: row.title.clone(),
            description: row.description.clone(),
            location: row.location.clone(),
            position,
            category,
            climate_impact,
            published: PublicationDate::parse(&row.date),
            source: row.source.clone(),
            url: row.url.clone(),
        })
    }
}

fn parse_id(raw: &str) -> Result<RecordId, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::MissingField("id"));
    }
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(RecordId(n)),
        _ => Err(ValidationError::InvalidId(raw.to_string())),
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    raw.parse::<f64>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// A dataset row excluded at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    pub line: usize,
    pub raw_id: String,
    pub error: ValidationError,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// The canonical, validated record set.
///
/// Ordering contract:
/// - `iter()` and `ids()` yield records in ascending id order.
#[derive(Debug)]
pub struct RecordSet {
    generation: u64,
    records: Vec<Record>,
    rejections: Vec<RowRejection>,
}

impl RecordSet {
    /// Validates every row independently. Invalid rows (including later
    /// duplicates of an id) are logged and excluded.
    pub fn from_rows(rows: &[RawRow]) -> Self {
        let mut records: Vec<Record> = Vec::with_capacity(rows.len());
        let mut rejections = Vec::new();
        let mut seen: BTreeSet<RecordId> = BTreeSet::new();

        for row in rows {
            let validated = Record::from_raw(row).and_then(|record| {
                if seen.insert(record.id) {
                    Ok(record)
                } else {
                    Err(ValidationError::DuplicateId(record.id))
                }
            });
            match validated {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(line = row.line, id = %row.id, %error, "skipping invalid dataset row");
                    rejections.push(RowRejection {
                        line: row.line,
                        raw_id: row.id.clone(),
                        error,
                    });
                }
            }
        }

        records.sort_by_key(|r| r.id);
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            records,
            rejections,
        }
    }

    /// Parses a whole dataset payload, sniffing CSV vs JSON.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let rows = parse_rows(text, DatasetFormat::sniff(text))?;
        let set = Self::from_rows(&rows);
        info!(
            records = set.len(),
            rejected = set.rejections.len(),
            "dataset loaded"
        );
        Ok(set)
    }

    /// Process-unique identity of this set, used as a memoization key.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.records.iter().map(|r| r.id)
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn rejections(&self) -> &[RowRejection] {
        &self.rejections
    }
}
