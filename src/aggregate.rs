use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::assigner::{Assignment, AtomicPolygon};
use crate::error::{Error, Result};

// Stable identifier of a sub-watershed polygon
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatershedId(pub i64);

impl WatershedId {
    // Integer ids, or whole-number doubles as shapefile DOUBLE fields export them
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => match number.as_i64() {
                Some(id) => Some(WatershedId(id)),
                None => number.as_f64().and_then(Self::from_whole),
            },
            Value::String(text) => Self::from_text(text),
            _ => None,
        }
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.parse::<i64>() {
            Ok(id) => Some(WatershedId(id)),
            Err(_) => text.parse::<f64>().ok().and_then(Self::from_whole),
        }
    }

    fn from_whole(value: f64) -> Option<Self> {
        // Beyond 2^53 a double no longer holds every integer
        let exact =
            value.is_finite() && value.fract() == 0.0 && value.abs() <= 9_007_199_254_740_992.0;
        exact.then_some(WatershedId(value as i64))
    }
}

impl fmt::Display for WatershedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WSID {}", self.0)
    }
}

// Rounding applied to the weighted average curve number
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfAwayFromZero,
    HalfEven,
}

impl RoundingMode {
    pub fn round(self, value: f64) -> f64 {
        match self {
            RoundingMode::HalfAwayFromZero => value.round(),
            RoundingMode::HalfEven => value.round_ties_even(),
        }
    }
}

// Running sums for one watershed
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WatershedTotals {
    pub cn_area: f64,         // Sum of area times curve number [ac]
    pub impervious_area: f64, // Sum of impervious area [ac]
    pub area: f64,            // Sum of polygon area [ac]
}

impl WatershedTotals {
    // Weighted values are rebuilt from the polygon's current area, the one summed below;
    // unassigned polygons still count toward the area with zero weighted values
    pub fn add(&mut self, polygon: &AtomicPolygon) {
        if let Some(assignment) = polygon.assignment {
            let weighted = Assignment::weighted(
                polygon.area,
                assignment.curve_number,
                assignment.percent_impervious,
            );
            self.cn_area += weighted.cn_area;
            self.impervious_area += weighted.impervious_area;
        }
        self.area += polygon.area;
    }

    pub fn finish(&self, watershed: WatershedId, rounding: RoundingMode) -> Result<WatershedSummary> {
        if self.area <= 0.0 {
            return Err(Error::zero_area(watershed));
        }
        let mean_cn = rounding.round(self.cn_area / self.area);
        let percent_impervious = self.impervious_area / self.area * 100.0;
        if !(0.0..=100.0).contains(&mean_cn) || !(0.0..=100.0).contains(&percent_impervious) {
            return Err(Error::domain(
                watershed.to_string(),
                format!(
                    "weighted curve number {mean_cn} or percent impervious {percent_impervious} outside 0-100"
                ),
            ));
        }
        Ok(WatershedSummary {
            watershed,
            total_area: self.area,
            total_cn: mean_cn as u8,
            total_percent_impervious: percent_impervious,
        })
    }
}

// Area-weighted results for one watershed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatershedSummary {
    pub watershed: WatershedId,
    pub total_area: f64,               // [ac]
    pub total_cn: u8,                  // [-]
    pub total_percent_impervious: f64, // [%]
}

#[derive(Debug)]
pub struct WatershedFailure {
    pub watershed: WatershedId,
    pub error: Error,
}

// Outcome of a batch: watersheds are independent, so one failure never hides the others
#[derive(Debug, Default)]
pub struct BatchReport {
    pub summaries: Vec<WatershedSummary>,
    pub failures: Vec<WatershedFailure>,
}

impl BatchReport {
    pub fn summary(&self, watershed: WatershedId) -> Option<&WatershedSummary> {
        self.summaries.iter().find(|s| s.watershed == watershed)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Groups assigned overlay polygons by watershed and computes the
/// area-weighted curve number and imperviousness of each group.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aggregator {
    rounding: RoundingMode,
}

impl Aggregator {
    pub fn new(rounding: RoundingMode) -> Self {
        Aggregator { rounding }
    }

    pub fn aggregate(&self, polygons: &[AtomicPolygon]) -> BatchReport {
        self.aggregate_watersheds(std::iter::empty::<WatershedId>(), polygons)
    }

    // Watersheds listed up front but absent from the overlay fail with a zero-area error
    pub fn aggregate_watersheds(
        &self,
        watersheds: impl IntoIterator<Item = WatershedId>,
        polygons: &[AtomicPolygon],
    ) -> BatchReport {
        let mut groups: BTreeMap<WatershedId, Vec<&AtomicPolygon>> = BTreeMap::new();
        for watershed in watersheds {
            groups.entry(watershed).or_default();
        }
        for polygon in polygons {
            groups.entry(polygon.watershed).or_default().push(polygon);
        }

        #[cfg(feature = "threading")]
        let results: Vec<_> = groups
            .into_par_iter()
            .map(|(id, group)| (id, self.summarize(id, &group)))
            .collect();
        #[cfg(not(feature = "threading"))]
        let results: Vec<_> = groups
            .into_iter()
            .map(|(id, group)| (id, self.summarize(id, &group)))
            .collect();

        let mut report = BatchReport::default();
        for (watershed, result) in results {
            match result {
                Ok(summary) => {
                    debug!(%watershed, cn = summary.total_cn, area = summary.total_area, "aggregated watershed");
                    report.summaries.push(summary);
                }
                Err(error) => {
                    warn!(%watershed, %error, "watershed aggregation failed");
                    report.failures.push(WatershedFailure { watershed, error });
                }
            }
        }
        report
    }

    fn summarize(&self, watershed: WatershedId, group: &[&AtomicPolygon]) -> Result<WatershedSummary> {
        let mut totals = WatershedTotals::default();
        for polygon in group {
            if !polygon.area.is_finite() || polygon.area < 0.0 {
                return Err(Error::input(
                    format!("polygon of {watershed}"),
                    format!("invalid area {}", polygon.area),
                ));
            }
            totals.add(polygon);
        }
        totals.finish(watershed, self.rounding)
    }
}
