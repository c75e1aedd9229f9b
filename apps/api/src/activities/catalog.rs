//! Activity Catalog: loads `activities.csv` into typed `Activity` records.
//!
//! The sheet is maintained by hand in a spreadsheet, so the loader is lenient about
//! everything except the `Activity Name` column: unknown columns are ignored, `Unnamed`
//! export columns are dropped, short rows are tolerated, and Latin-1 files are accepted
//! when the bytes are not valid UTF-8.

use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::activity::{clean_field, is_blank, name_key, Activity, ActivitySource, AgeBand};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Required column '{0}' not found")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Latin1,
}

/// In-memory, read-only catalog shared by all requests.
#[derive(Debug, Clone, Default)]
pub struct ActivityCatalog {
    activities: Vec<Activity>,
    /// Searchable text that is not shown to parents ("Analyze Progress").
    notes: Vec<String>,
}

impl ActivityCatalog {
    pub fn from_activities(activities: Vec<Activity>) -> Self {
        let notes = vec![String::new(); activities.len()];
        Self { activities, notes }
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn get(&self, position: usize) -> Option<&Activity> {
        self.activities.get(position)
    }

    pub fn notes(&self, position: usize) -> &str {
        self.notes.get(position).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

/// Reads and parses the catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<ActivityCatalog, CatalogError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let (text, encoding) = decode_text(bytes);
    if encoding == SourceEncoding::Latin1 {
        warn!("{} is not valid UTF-8, decoded as Latin-1", path.display());
    }
    let catalog = parse_catalog(&text)?;
    info!("Loaded {} activities from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// UTF-8 first, Latin-1 as the fallback. Latin-1 maps every byte to one code point,
/// so the fallback cannot fail.
pub fn decode_text(bytes: Vec<u8>) -> (String, SourceEncoding) {
    match String::from_utf8(bytes) {
        Ok(mut text) => {
            if text.starts_with('\u{feff}') {
                text.remove(0);
            }
            (text, SourceEncoding::Utf8)
        }
        Err(err) => {
            let text = err.into_bytes().into_iter().map(char::from).collect();
            (text, SourceEncoding::Latin1)
        }
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    name: usize,
    focus: Option<usize>,
    conditions: Option<usize>,
    illness: Option<usize>,
    keywords: Option<usize>,
    delivery: Option<usize>,
    description: Option<usize>,
    analyze: Option<usize>,
    age_min: Option<usize>,
    age_max: Option<usize>,
    age_group: Option<usize>,
    /// Checkbox columns such as "3-5 yrs".
    bands: Vec<(usize, AgeBand)>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, CatalogError> {
        let mut name = None;
        let mut map = ColumnMap::default();

        for (i, raw) in headers.iter().enumerate() {
            let header = raw.trim();
            if header.is_empty() || header.starts_with("Unnamed") {
                continue;
            }
            match header.to_lowercase().as_str() {
                "activity name" => name = name.or(Some(i)),
                "focus area(s)" | "focus area" | "focus areas" => map.focus = map.focus.or(Some(i)),
                "conditions" => map.conditions = Some(i),
                "illness attached" => map.illness = Some(i),
                "other keywords" | "keywords" => map.keywords = map.keywords.or(Some(i)),
                "delivery" => map.delivery = Some(i),
                "parent description" | "description" => {
                    map.description = map.description.or(Some(i))
                }
                "analyze progress" => map.analyze = Some(i),
                "age min" => map.age_min = Some(i),
                "age max" => map.age_max = Some(i),
                "age group" => map.age_group = Some(i),
                _ => {
                    if let Some(band) = AgeBand::parse(header) {
                        map.bands.push((i, band));
                    }
                }
            }
        }

        map.name = name.ok_or(CatalogError::MissingColumn("Activity Name"))?;
        Ok(map)
    }

    fn age_band(&self, record: &StringRecord) -> Option<AgeBand> {
        let number = |col: Option<usize>| -> Option<u32> {
            let raw = cell(record, col)?;
            let value = raw.parse::<f64>().ok()?;
            (value.is_finite() && value >= 0.0).then(|| value.round() as u32)
        };

        if let (Some(min), Some(max)) = (number(self.age_min), number(self.age_max)) {
            return Some(AgeBand::new(min, max));
        }
        if let Some(band) = cell(record, self.age_group).and_then(AgeBand::parse) {
            return Some(band);
        }
        self.bands
            .iter()
            .filter(|(col, _)| cell(record, Some(*col)).is_some_and(is_truthy))
            .map(|(_, band)| *band)
            .reduce(|a, b| a.union(&b))
    }
}

fn cell(record: &StringRecord, col: Option<usize>) -> Option<&str> {
    col.and_then(|c| record.get(c))
        .map(str::trim)
        .filter(|v| !is_blank(v))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "x" | "yes" | "y" | "true" | "1" | "✓" | "✔"
    )
}

/// Parses CSV text. Rows without a usable name are dropped, duplicates by
/// case-folded name keep their first occurrence.
pub fn parse_catalog(text: &str) -> Result<ActivityCatalog, CatalogError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let columns = ColumnMap::from_headers(reader.headers()?)?;

    let mut activities = Vec::new();
    let mut notes = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped_blank = 0usize;
    let mut skipped_duplicate = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable catalog row {}: {e}", line + 2);
                continue;
            }
        };

        let Some(name) = cell(&record, Some(columns.name)) else {
            skipped_blank += 1;
            continue;
        };
        if !seen.insert(name_key(name)) {
            skipped_duplicate += 1;
            continue;
        }

        let conditions = cell(&record, columns.conditions).or(cell(&record, columns.illness));

        activities.push(Activity {
            name: name.to_string(),
            focus_area: clean_field(cell(&record, columns.focus)),
            conditions: clean_field(conditions),
            keywords: clean_field(cell(&record, columns.keywords)),
            delivery: clean_field(cell(&record, columns.delivery)),
            description: clean_field(cell(&record, columns.description)),
            age_band: columns.age_band(&record),
            source: ActivitySource::Catalog,
        });
        notes.push(cell(&record, columns.analyze).unwrap_or("").to_string());
    }

    if skipped_blank + skipped_duplicate > 0 {
        info!(
            "Catalog parse skipped {skipped_blank} unnamed and {skipped_duplicate} duplicate rows"
        );
    }

    Ok(ActivityCatalog { activities, notes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::BLANK;
    use std::io::Write;

    const SHEET: &str = "\
Activity Name,Focus Area(s),Illness Attached,Conditions,Other Keywords,Parent Description,Analyze Progress,Age Group,Unnamed: 9
Bubble Painting,Fine Motor,ADHD,,\"bubbles, colour\",Blow bubbles onto paper,Watch grip,3-6,
,Gross Motor,,,,,,,
nan,Cognitive,,,,,,,
bubble painting,Sensory,,,,,,,
Sorting Game,Cognitive,,Autism,\"sorting, matching\",,,,
Obstacle Course,Gross Motor,,,running,,,2 – 4,
";

    #[test]
    fn test_blank_and_nan_names_are_excluded() {
        let catalog = parse_catalog(SHEET).unwrap();
        let names: Vec<_> = catalog.activities().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bubble Painting", "Sorting Game", "Obstacle Course"]);
    }

    #[test]
    fn test_duplicate_names_keep_first_row() {
        let catalog = parse_catalog(SHEET).unwrap();
        let bubble = &catalog.activities()[0];
        assert_eq!(bubble.focus_area, "Fine Motor");
    }

    #[test]
    fn test_conditions_prefer_conditions_column_then_illness() {
        let catalog = parse_catalog(SHEET).unwrap();
        assert_eq!(catalog.activities()[0].conditions, "ADHD");
        assert_eq!(catalog.activities()[1].conditions, "Autism");
    }

    #[test]
    fn test_blank_fields_use_placeholder() {
        let catalog = parse_catalog(SHEET).unwrap();
        let sorting = &catalog.activities()[1];
        assert_eq!(sorting.description, BLANK);
        assert_eq!(sorting.delivery, BLANK);
        assert_eq!(sorting.age_band, None);
    }

    #[test]
    fn test_age_group_and_notes() {
        let catalog = parse_catalog(SHEET).unwrap();
        assert_eq!(catalog.activities()[0].age_band, Some(AgeBand::new(3, 6)));
        assert_eq!(catalog.activities()[2].age_band, Some(AgeBand::new(2, 4)));
        assert_eq!(catalog.notes(0), "Watch grip");
        assert_eq!(catalog.notes(99), "");
    }

    #[test]
    fn test_age_checkbox_columns_are_merged() {
        let sheet = "Activity Name,Age Min,Age Max,3-5 yrs,6-8 yrs,9-12 yrs\n\
                     Story Dice,,,x,Yes,\n\
                     Clay Models,4,7,,,x\n";
        let catalog = parse_catalog(sheet).unwrap();
        assert_eq!(catalog.activities()[0].age_band, Some(AgeBand::new(3, 8)));
        // explicit min/max wins over checkboxes
        assert_eq!(catalog.activities()[1].age_band, Some(AgeBand::new(4, 7)));
    }

    #[test]
    fn test_missing_name_column_is_an_error() {
        let result = parse_catalog("Title,Focus Area(s)\nA,B\n");
        assert!(matches!(result, Err(CatalogError::MissingColumn("Activity Name"))));
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"Activity Name,Parent Description\nCaf\xe9 Play,Role play\n".to_vec();
        let (text, encoding) = decode_text(bytes);
        assert_eq!(encoding, SourceEncoding::Latin1);
        let catalog = parse_catalog(&text).unwrap();
        assert_eq!(catalog.activities()[0].name, "Café Play");
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let bytes = "\u{feff}Activity Name\nDance Freeze\n".as_bytes().to_vec();
        let (text, encoding) = decode_text(bytes);
        assert_eq!(encoding, SourceEncoding::Utf8);
        assert_eq!(parse_catalog(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHEET.as_bytes()).unwrap();
        let catalog = load_catalog(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let result = load_catalog("/definitely/not/here.csv");
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
