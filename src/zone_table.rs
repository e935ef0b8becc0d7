use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

// Curve numbers and imperviousness for one land-use zone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub code: String,            // Land-use zone code like "R5" or "ROW"
    pub cn_b: u8,                // Curve number for soil group B [-]
    pub cn_c: u8,                // Curve number for soil group C [-]
    pub cn_other: u8,            // Curve number for any other soil group [-]
    pub percent_impervious: f64, // Impervious cover [%]
}

impl ZoneEntry {
    pub fn new(code: &str, cn_b: u8, cn_c: u8, cn_other: u8, percent_impervious: f64) -> Self {
        ZoneEntry {
            code: code.to_string(),
            cn_b,
            cn_c,
            cn_other,
            percent_impervious,
        }
    }

    // Soil group dispatch: B and C have their own column, A, D and anything else share the fallback
    pub fn curve_number(&self, soil_group: &str) -> u8 {
        match soil_group {
            "B" => self.cn_b,
            "C" => self.cn_c,
            _ => self.cn_other,
        }
    }
}

/// Ordered, immutable zone-to-curve-number table.
///
/// Zone codes are unique, so the first-match lookup behaves like a map while
/// keeping the table order of the source configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneTable {
    entries: Vec<ZoneEntry>,
}

impl ZoneTable {
    pub fn new(entries: Vec<ZoneEntry>) -> Result<Self> {
        validate(&entries)?;
        Ok(ZoneTable { entries })
    }

    pub fn lookup(&self, zone: &str) -> Option<&ZoneEntry> {
        self.entries.iter().find(|entry| entry.code == zone)
    }

    pub fn entries(&self) -> &[ZoneEntry] {
        &self.entries
    }
}

// Rejects out-of-range values and duplicate or empty zone codes
fn validate(entries: &[ZoneEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.code.trim().is_empty() {
            return Err(Error::Configuration {
                message: "zone table contains an empty zone code".to_string(),
            });
        }
        if !seen.insert(entry.code.as_str()) {
            return Err(Error::Configuration {
                message: format!("zone '{}' is listed more than once", entry.code),
            });
        }
        for cn in [entry.cn_b, entry.cn_c, entry.cn_other] {
            if cn > 100 {
                return Err(Error::Configuration {
                    message: format!("zone '{}' has curve number {cn} above 100", entry.code),
                });
            }
        }
        if !(0.0..=100.0).contains(&entry.percent_impervious) {
            return Err(Error::Configuration {
                message: format!(
                    "zone '{}' has percent impervious {} outside 0-100",
                    entry.code, entry.percent_impervious
                ),
            });
        }
    }
    Ok(())
}

impl Default for ZoneTable {
    // Built-in zoning table shipped with the curve number tool
    fn default() -> Self {
        ZoneTable {
            entries: vec![
                ZoneEntry::new("A", 61, 74, 80, 35.0),
                ZoneEntry::new("CG", 92, 94, 95, 85.0),
                ZoneEntry::new("P", 69, 79, 84, 0.0),
                ZoneEntry::new("PUD", 85, 90, 92, 90.0),
                ZoneEntry::new("R5", 75, 83, 87, 35.0),
                ZoneEntry::new("R10", 85, 90, 92, 50.0),
                ZoneEntry::new("RMH", 85, 90, 92, 50.0),
                ZoneEntry::new("RR", 68, 79, 84, 12.0),
                ZoneEntry::new("RT", 92, 94, 95, 75.0),
                ZoneEntry::new("ROW", 98, 98, 98, 98.0),
            ],
        }
    }
}
