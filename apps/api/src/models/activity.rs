use serde::{Deserialize, Serialize};

/// Placeholder shown for any activity field the source left blank.
pub const BLANK: &str = "—";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    Catalog,
    Generated,
}

/// Inclusive age range in whole years.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgeBand {
    pub min: u32,
    pub max: u32,
}

impl AgeBand {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, age: u32) -> bool {
        self.min <= age && age <= self.max
    }

    /// Smallest band covering both.
    pub fn union(&self, other: &AgeBand) -> AgeBand {
        AgeBand {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Parses "3-5", "3 – 5 yrs", "Ages 6-8" and similar.
    pub fn parse(text: &str) -> Option<AgeBand> {
        let mut numbers = Vec::with_capacity(2);
        let mut current = String::new();
        let mut saw_separator = false;
        for ch in text.chars() {
            if ch.is_ascii_digit() {
                current.push(ch);
                continue;
            }
            if !current.is_empty() {
                numbers.push(current.parse::<u32>().ok()?);
                current.clear();
                if numbers.len() == 2 {
                    break;
                }
            }
            if matches!(ch, '-' | '–' | '—') && numbers.len() == 1 {
                saw_separator = true;
            }
        }
        if !current.is_empty() && numbers.len() < 2 {
            numbers.push(current.parse::<u32>().ok()?);
        }
        match numbers.as_slice() {
            [a, b] if saw_separator => Some(AgeBand::new(*a, *b)),
            _ => None,
        }
    }
}

/// A therapeutic or developmental task for a child, from the catalog or generated text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub name: String,
    pub focus_area: String,
    pub conditions: String,
    pub keywords: String,
    pub delivery: String,
    pub description: String,
    pub age_band: Option<AgeBand>,
    pub source: ActivitySource,
}

impl Activity {
    /// Case-folded name used for de-duplication within one response.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalises a raw cell: blank, "nan", "none" and dashes all collapse to `BLANK`.
pub fn clean_field(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(v) if !is_blank(v) => v.to_string(),
        _ => BLANK.to_string(),
    }
}

pub fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v == BLANK
        || v == "-"
        || v.eq_ignore_ascii_case("nan")
        || v.eq_ignore_ascii_case("none")
        || v.eq_ignore_ascii_case("null")
}
