use serde::{Deserialize, Serialize};

use crate::aggregate::WatershedSummary;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthUnits {
    #[default]
    Inches,
    Millimeters,
}

impl DepthUnits {
    // Maximum potential retention S for a curve number
    fn retention(self, curve_number: f64) -> f64 {
        match self {
            DepthUnits::Inches => 1000.0 / curve_number - 10.0,
            DepthUnits::Millimeters => 25400.0 / curve_number - 254.0,
        }
    }
}

/**
Runoff depth from a composite NRCS curve number.

Once a watershed has an area-weighted curve number, the SCS runoff equation
turns a storm depth into a direct runoff depth. Both the US customary form
(inches) and the metric form (millimeters) are supported; they differ only in
the scale of the maximum potential retention.

# Arguments
- `storm_depth` - Rainfall depth for the event, in the chosen units.
- `curve_number` - Composite curve number of the watershed, in (0, 100].
- `units` - Depth units of `storm_depth` and of the result.

# Returns
The direct runoff depth, in the same units as `storm_depth`.
*/
pub fn runoff_depth(storm_depth: f64, curve_number: f64, units: DepthUnits) -> Result<f64> {
    if !(curve_number > 0.0 && curve_number <= 100.0) {
        return Err(Error::domain(
            "runoff equation",
            format!("curve number {curve_number} outside (0, 100]"),
        ));
    }
    if !storm_depth.is_finite() {
        return Err(Error::input("storm", format!("invalid storm depth {storm_depth}")));
    }
    if storm_depth <= 0.0 {
        return Ok(0.0);
    }

    let s = units.retention(curve_number);

    // Initial abstraction (Ia = 0.2 * S)
    let ia = 0.2 * s;
    if storm_depth <= ia {
        return Ok(0.0);
    }

    // Q = (P - Ia)^2 / (P - Ia + S)
    Ok((storm_depth - ia).powi(2) / (storm_depth - ia + s))
}

impl WatershedSummary {
    pub fn runoff_depth(&self, storm_depth: f64, units: DepthUnits) -> Result<f64> {
        runoff_depth(storm_depth, f64::from(self.total_cn), units).map_err(|err| match err {
            Error::Domain { message, .. } => Error::domain(self.watershed.to_string(), message),
            other => other,
        })
    }
}
