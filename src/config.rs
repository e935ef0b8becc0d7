use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::aggregate::{Aggregator, RoundingMode};
use crate::assigner::{CurveNumberAssigner, MissingZonePolicy};
use crate::error::{Error, Result};
use crate::zone_table::{ZoneEntry, ZoneTable};

// Attribute names read from and written to the GIS layers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub watershed_id: String,       // Join key added to the watershed layer
    pub soil_group: String,         // Hydrologic soil group on the soils layer
    pub zone: String,               // Land-use zone code on the land-cover layer
    pub curve_number: String,       // Per-polygon curve number
    pub percent_impervious: String, // Per-polygon impervious percent
    pub area: String,               // Per-polygon area in acres
    pub cn_area: String,            // Per-polygon area times curve number
    pub impervious_area: String,    // Per-polygon impervious area
    pub total_cn: String,
    pub total_percent_impervious: String,
    pub total_area: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            watershed_id: "WSID".to_string(),
            soil_group: "hydgrpdcd".to_string(),
            zone: "ZONE".to_string(),
            curve_number: "CN".to_string(),
            percent_impervious: "P_Imperv".to_string(),
            area: "POLY_AREA".to_string(),
            cn_area: "CNAREA".to_string(),
            impervious_area: "IpArea".to_string(),
            total_cn: "CN_Total".to_string(),
            total_percent_impervious: "PercImperv".to_string(),
            total_area: "Area_ac".to_string(),
        }
    }
}

/// Settings for a curve number run, usually read from a TOML file.
///
/// Every key is optional. Without a `[[zone]]` list the built-in zoning
/// table is used.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub rounding: RoundingMode,
    pub missing_zone: MissingZonePolicy,
    pub fields: FieldNames,
    #[serde(rename = "zone", skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<ZoneEntry>>,
}

impl ToolConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let toml_str = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_str)
    }

    pub fn zone_table(&self) -> Result<ZoneTable> {
        match &self.zones {
            Some(entries) if entries.is_empty() => Err(Error::Configuration {
                message: "zone table is empty".to_string(),
            }),
            Some(entries) => ZoneTable::new(entries.clone()),
            None => Ok(ZoneTable::default()),
        }
    }

    pub fn assigner(&self) -> Result<CurveNumberAssigner> {
        Ok(CurveNumberAssigner::new(self.zone_table()?, self.missing_zone))
    }

    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.rounding)
    }
}
