use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::WatershedId;
use crate::error::{Error, Result};
use crate::zone_table::ZoneTable;

// What to do with a polygon whose zone has no table entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingZonePolicy {
    #[default]
    Error, // Fail with a configuration error
    Skip,  // Leave the polygon's previous values untouched
}

// Values attached to an atomic polygon by the assigner
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub curve_number: u8,        // [-]
    pub percent_impervious: f64, // [%]
    pub cn_area: f64,            // Area times curve number [ac]
    pub impervious_area: f64,    // Impervious area [ac]
}

impl Assignment {
    // Weighted contributions use the same area the aggregator sums
    pub(crate) fn weighted(area: f64, curve_number: u8, percent_impervious: f64) -> Self {
        Assignment {
            curve_number,
            percent_impervious,
            cn_area: area * f64::from(curve_number),
            impervious_area: 0.01 * area * percent_impervious,
        }
    }
}

// One polygon of the watershed x soils x land-cover overlay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtomicPolygon {
    pub watershed: WatershedId,
    pub zone: String,       // Land-use zone code
    pub soil_group: String, // Hydrologic soil group, single letter after normalization
    pub area: f64,          // [ac]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
}

impl AtomicPolygon {
    pub fn new(watershed: WatershedId, zone: &str, soil_group: &str, area: f64) -> Self {
        AtomicPolygon {
            watershed,
            zone: zone.to_string(),
            soil_group: soil_group.to_string(),
            area,
            assignment: None,
        }
    }

    // Attribute checks done before any lookup
    pub fn validate(&self) -> Result<()> {
        let record = format!("polygon of {}", self.watershed);
        if self.zone.trim().is_empty() {
            return Err(Error::input(record, "land-use zone is empty"));
        }
        if self.soil_group.chars().count() != 1 {
            return Err(Error::input(
                record,
                format!("soil group '{}' is not a single letter", self.soil_group),
            ));
        }
        if !self.area.is_finite() || self.area < 0.0 {
            return Err(Error::input(record, format!("invalid area {}", self.area)));
        }
        Ok(())
    }
}

// Looks up curve number and imperviousness for overlay polygons
#[derive(Clone, Debug)]
pub struct CurveNumberAssigner {
    table: ZoneTable,
    missing_zone: MissingZonePolicy,
}

impl CurveNumberAssigner {
    pub fn new(table: ZoneTable, missing_zone: MissingZonePolicy) -> Self {
        CurveNumberAssigner {
            table,
            missing_zone,
        }
    }

    /// Curve number and percent impervious for a zone and soil group.
    ///
    /// The area only scales the weighted contributions; a missing zone is
    /// always a configuration error here, the skip policy applies to
    /// [`CurveNumberAssigner::assign_polygon`].
    pub fn assign(&self, zone: &str, soil_group: &str, area: f64) -> Result<Assignment> {
        let entry = self.table.lookup(zone).ok_or_else(|| Error::missing_zone(zone))?;
        Ok(Assignment::weighted(
            area,
            entry.curve_number(soil_group),
            entry.percent_impervious,
        ))
    }

    // Attach an assignment to the polygon, returns false when a missing zone was skipped
    pub fn assign_polygon(&self, polygon: &mut AtomicPolygon) -> Result<bool> {
        polygon.validate()?;
        match self.assign(&polygon.zone, &polygon.soil_group, polygon.area) {
            Ok(assignment) => {
                polygon.assignment = Some(assignment);
                Ok(true)
            }
            Err(Error::Configuration { .. }) if self.missing_zone == MissingZonePolicy::Skip => {
                warn!(
                    watershed = %polygon.watershed,
                    zone = %polygon.zone,
                    "zone missing from curve number table, polygon left unassigned"
                );
                Ok(false)
            }
            Err(Error::Configuration { message }) => Err(Error::Configuration {
                message: format!("{message} (polygon of {})", polygon.watershed),
            }),
            Err(other) => Err(other),
        }
    }
}

impl Default for CurveNumberAssigner {
    fn default() -> Self {
        CurveNumberAssigner::new(ZoneTable::default(), MissingZonePolicy::default())
    }
}
