mod aggregate;
mod assigner;
mod config;
mod error;
mod geoprocess;
mod join;
mod overlay;
mod pipeline;
mod runoff;
mod soil_group;
mod zone_table;

pub use aggregate::{
    Aggregator, BatchReport, RoundingMode, WatershedFailure, WatershedId, WatershedSummary,
    WatershedTotals,
};
pub use assigner::{Assignment, AtomicPolygon, CurveNumberAssigner, MissingZonePolicy};
pub use config::{FieldNames, ToolConfig};
pub use error::{Error, Result};
pub use geoprocess::Geoprocessor;
pub use join::{WatershedRecord, join_summaries, number_watersheds, watershed_ids};
pub use overlay::{OverlayRead, RejectedRecord, polygons_from_columns, polygons_from_json};
pub use pipeline::{CurveNumberInputs, CurveNumberRun, CurveNumberTool, OverlaySummary};
pub use runoff::{DepthUnits, runoff_depth};
pub use soil_group::{normalize_soil_column, normalize_soil_group};
pub use zone_table::{ZoneEntry, ZoneTable};
