use serde_json::{Map, Value};

use crate::table::{TableError, read_table};

/// Columns of the restoration-case dataset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Title,
    Description,
    Location,
    Lat,
    Lng,
    Category,
    ClimateImpact,
    Date,
    Source,
    Url,
}

impl Column {
    pub const REQUIRED: [Column; 4] = [Column::Id, Column::Lat, Column::Lng, Column::Category];

    /// Resolves a header cell (or JSON key), accepting the common aliases.
    pub fn from_header(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let col = match key.as_str() {
            "id" => Column::Id,
            "title" | "name" => Column::Title,
            "description" | "summary" => Column::Description,
            "location" | "location_name" | "place" => Column::Location,
            "lat" | "latitude" => Column::Lat,
            "lng" | "lon" | "long" | "longitude" => Column::Lng,
            "category" => Column::Category,
            "climate_impact" | "impact" => Column::ClimateImpact,
            "date" | "publication_date" | "published" => Column::Date,
            "source" | "source_name" => Column::Source,
            "url" | "source_url" | "link" => Column::Url,
            _ => return None,
        };
        Some(col)
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Title => "title",
            Column::Description => "description",
            Column::Location => "location",
            Column::Lat => "lat",
            Column::Lng => "lng",
            Column::Category => "category",
            Column::ClimateImpact => "climate_impact",
            Column::Date => "date",
            Column::Source => "source",
            Column::Url => "url",
        }
    }
}

/// One untyped dataset row. Cells are trimmed; absent cells are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based CSV line, or 1-based position in a JSON array.
    pub line: usize,
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub lat: String,
    pub lng: String,
    pub category: String,
    pub climate_impact: String,
    pub date: String,
    pub source: String,
    pub url: String,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }

    pub fn set(&mut self, column: Column, value: &str) {
        let slot = match column {
            Column::Id => &mut self.id,
            Column::Title => &mut self.title,
            Column::Description => &mut self.description,
            Column::Location => &mut self.location,
            Column::Lat => &mut self.lat,
            Column::Lng => &mut self.lng,
            Column::Category => &mut self.category,
            Column::ClimateImpact => &mut self.climate_impact,
            Column::Date => &mut self.date,
            Column::Source => &mut self.source,
            Column::Url => &mut self.url,
        };
        *slot = value.trim().to_string();
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    /// A JSON array of row objects, or a GeoJSON FeatureCollection of points.
    Json,
}

impl DatasetFormat {
    pub fn sniff(text: &str) -> Self {
        match text.trim_start_matches('\u{feff}').trim_start().chars().next() {
            Some('[') | Some('{') => DatasetFormat::Json,
            _ => DatasetFormat::Csv,
        }
    }
}

/// The dataset as a whole is unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    Empty,
    MissingColumns(Vec<&'static str>),
    Table(TableError),
    Json(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Empty => write!(f, "dataset is empty"),
            FormatError::MissingColumns(cols) => {
                write!(f, "dataset header is missing columns: {}", cols.join(", "))
            }
            FormatError::Table(e) => write!(f, "malformed table: {e}"),
            FormatError::Json(msg) => write!(f, "malformed JSON dataset: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<TableError> for FormatError {
    fn from(e: TableError) -> Self {
        FormatError::Table(e)
    }
}

pub fn parse_rows(text: &str, format: DatasetFormat) -> Result<Vec<RawRow>, FormatError> {
    match format {
        DatasetFormat::Csv => parse_csv_rows(text),
        DatasetFormat::Json => parse_json_rows(text),
    }
}

pub fn parse_csv_rows(text: &str) -> Result<Vec<RawRow>, FormatError> {
    let mut records = read_table(text)?.into_iter();
    let header = records.next().ok_or(FormatError::Empty)?;

    let columns: Vec<Option<Column>> = header
        .fields
        .iter()
        .map(|h| Column::from_header(h))
        .collect();
    let missing: Vec<&'static str> = Column::REQUIRED
        .iter()
        .filter(|req| !columns.contains(&Some(**req)))
        .map(|c| c.name())
        .collect();
    if !missing.is_empty() {
        return Err(FormatError::MissingColumns(missing));
    }

    let rows = records
        .map(|record| {
            let mut row = RawRow::new(record.line);
            for (col, value) in columns.iter().zip(&record.fields) {
                if let Some(col) = col {
                    row.set(*col, value);
                }
            }
            row
        })
        .collect();
    Ok(rows)
}

pub fn parse_json_rows(text: &str) -> Result<Vec<RawRow>, FormatError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FormatError::Json(e.to_string()))?;

    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let obj = item
                    .as_object()
                    .ok_or_else(|| FormatError::Json(format!("row {} is not an object", i + 1)))?;
                Ok(row_from_object(i + 1, obj))
            })
            .collect(),
        Value::Object(obj)
            if obj.get("type").and_then(Value::as_str) == Some("FeatureCollection") =>
        {
            let features = obj
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| FormatError::Json("FeatureCollection without features".into()))?;
            Ok(features
                .iter()
                .enumerate()
                .map(|(i, feature)| row_from_feature(i + 1, feature))
                .collect())
        }
        _ => Err(FormatError::Json(
            "expected an array of rows or a FeatureCollection".into(),
        )),
    }
}

fn row_from_object(line: usize, obj: &Map<String, Value>) -> RawRow {
    let mut row = RawRow::new(line);
    for (key, value) in obj {
        match Column::from_header(key) {
            Some(Column::Id) => row.set(Column::Id, &id_text(value)),
            Some(col) => row.set(col, &cell_text(value)),
            None => {}
        }
    }
    row
}

fn row_from_feature(line: usize, feature: &Value) -> RawRow {
    let props = feature
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut row = row_from_object(line, &props);

    // GeoJSON positions are [lng, lat].
    if let Some(coords) = feature
        .get("geometry")
        .filter(|g| g.get("type").and_then(Value::as_str) == Some("Point"))
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        && let [lng, lat, ..] = coords.as_slice()
    {
        row.set(Column::Lng, &cell_text(lng));
        row.set(Column::Lat, &cell_text(lat));
    }
    if row.id.is_empty()
        && let Some(id) = feature.get("id")
    {
        row.set(Column::Id, &id_text(id));
    }
    row
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ids written as integral floats (`4.0`) are normalised to `4`; anything
/// else keeps its literal text so validation can report it.
fn id_text(value: &Value) -> String {
    if let Value::Number(n) = value
        && n.as_u64().is_none()
        && let Some(f) = n.as_f64()
        && f.fract() == 0.0
        && (1.0..=MAX_EXACT_ID).contains(&f)
    {
        return format!("{}", f as u64);
    }
    cell_text(value)
}

// Largest integer an f64 holds exactly.
const MAX_EXACT_ID: f64 = 9_007_199_254_740_992.0;

#[cfg(test)]
mod tests {
    use super::{Column, DatasetFormat, FormatError, parse_rows};

    const CSV: &str = "\
id,title,description,location,lat,lng,category,climate_impact,date,source,url
1,Mangrove replanting,\"Replanting, 40 ha\",Demak,-6.89,110.64,Coastal,adaptation,2021-05-04,Wetlands Intl,https://example.org/1
2,Peat rewetting,,Riau,0.5,101.4,wetland,,2019-11-20,Pantau Gambut,https://example.org/2
";

    #[test]
    fn csv_rows_map_by_header() {
        let rows = parse_rows(CSV, DatasetFormat::Csv).expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].description, "Replanting, 40 ha");
        assert_eq!(rows[0].category, "Coastal");
        assert_eq!(rows[1].climate_impact, "");
        assert_eq!(rows[1].lng, "101.4");
    }

    #[test]
    fn header_aliases_and_column_order_do_not_matter() {
        let text = "Category,Longitude,Latitude,ID\nforest,10,20,7\n";
        let rows = parse_rows(text, DatasetFormat::Csv).unwrap();
        assert_eq!(rows[0].id, "7");
        assert_eq!(rows[0].lat, "20");
        assert_eq!(rows[0].lng, "10");
        assert_eq!(Column::from_header(" Source URL "), Some(Column::Url));
    }

    #[test]
    fn missing_required_columns_fail_the_whole_file() {
        let err = parse_rows("id,title\n1,x\n", DatasetFormat::Csv).unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingColumns(vec!["lat", "lng", "category"])
        );
        assert_eq!(
            parse_rows("   ", DatasetFormat::Csv).unwrap_err(),
            FormatError::Empty
        );
    }

    #[test]
    fn short_rows_leave_cells_empty() {
        let rows = parse_rows("id,lat,lng,category\n3,1.0\n", DatasetFormat::Csv).unwrap();
        assert_eq!(rows[0].lat, "1.0");
        assert_eq!(rows[0].lng, "");
    }

    #[test]
    fn json_array_accepts_numbers_and_nulls() {
        let text = r#"[{"id": 4, "lat": 12.5, "lng": -3, "category": "forest", "climate_impact": null}]"#;
        assert_eq!(DatasetFormat::sniff(text), DatasetFormat::Json);
        let rows = parse_rows(text, DatasetFormat::Json).unwrap();
        assert_eq!(rows[0].id, "4");
        assert_eq!(rows[0].lat, "12.5");
        assert_eq!(rows[0].lng, "-3");
        assert_eq!(rows[0].climate_impact, "");
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn integral_float_ids_are_normalised() {
        let text = r#"[{"id": 4.0, "lat": 1, "lng": 2, "category": "forest"},
                       {"id": 4.5, "lat": 1, "lng": 2, "category": "forest"},
                       {"id": -3.0, "lat": 1, "lng": 2, "category": "forest"}]"#;
        let rows = parse_rows(text, DatasetFormat::Json).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "4.5", "-3.0"]);
    }

    #[test]
    fn geojson_points_take_coordinates_from_geometry() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":9,"geometry":{"type":"Point","coordinates":[36.8,-1.3]},
             "properties":{"title":"Nairobi riparian strip","category":"freshwater"}}]}"#;
        let rows = parse_rows(text, DatasetFormat::Json).unwrap();
        assert_eq!(rows[0].id, "9");
        assert_eq!(rows[0].lat, "-1.3");
        assert_eq!(rows[0].lng, "36.8");
        assert_eq!(rows[0].title, "Nairobi riparian strip");
    }

    #[test]
    fn malformed_json_is_a_format_error() {
        assert!(matches!(
            parse_rows("[1, 2", DatasetFormat::Json),
            Err(FormatError::Json(_))
        ));
        assert!(matches!(
            parse_rows("[1]", DatasetFormat::Json),
            Err(FormatError::Json(_))
        ));
    }
}
