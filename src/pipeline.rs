use std::collections::BTreeMap;
use tracing::{info, info_span, warn};

use crate::aggregate::{Aggregator, BatchReport, WatershedFailure, WatershedId};
use crate::assigner::{AtomicPolygon, CurveNumberAssigner};
use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::geoprocess::Geoprocessor;
use crate::join;
use crate::overlay::{self, OverlayRead, RejectedRecord};
use crate::soil_group::{normalize_soil_column, normalize_soil_group};

// Source layers of a curve number run
pub struct CurveNumberInputs<L> {
    pub land_cover: L,
    pub soils: L,
    pub watersheds: L,
}

// Result of a full run: the joined watershed layer and what happened per watershed
pub struct CurveNumberRun<L> {
    pub output: L,
    pub report: BatchReport,
    pub skipped_polygons: usize,
    pub rejected: Vec<RejectedRecord>,
}

// Outcome of assigning and aggregating a set of overlay polygons
#[derive(Debug)]
pub struct OverlaySummary {
    pub report: BatchReport,
    pub skipped_polygons: usize,
    pub rejected: Vec<RejectedRecord>, // Overlay rows with no readable watershed id
}

/// Curve number and impervious area tool.
///
/// Drives the clip, normalize, dissolve, intersect, assign, aggregate and
/// join steps against a [`Geoprocessor`], or just the assign and aggregate
/// steps against overlay records exported from a GIS.
pub struct CurveNumberTool {
    config: ToolConfig,
    assigner: CurveNumberAssigner,
    aggregator: Aggregator,
}

impl CurveNumberTool {
    pub fn new(config: ToolConfig) -> Result<Self> {
        let assigner = config.assigner()?;
        let aggregator = config.aggregator();
        Ok(CurveNumberTool {
            config,
            assigner,
            aggregator,
        })
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn run<G: Geoprocessor>(
        &self,
        engine: &mut G,
        inputs: &CurveNumberInputs<G::Layer>,
    ) -> Result<CurveNumberRun<G::Layer>> {
        let fields = &self.config.fields;

        let (soils, land_cover) = {
            let _step = info_span!("clip").entered();
            let soils = engine.clip(&inputs.soils, &inputs.watersheds)?;
            let land_cover = engine.clip(&inputs.land_cover, &inputs.watersheds)?;
            (soils, land_cover)
        };

        let (watersheds, mut rows) = {
            let _step = info_span!("number_watersheds").entered();
            let mut rows = engine.attribute_rows(&inputs.watersheds)?;
            join::number_watersheds(&mut rows, fields);
            let watersheds = engine.copy_with_rows(&inputs.watersheds, &rows)?;
            info!(count = rows.len(), field = %fields.watershed_id, "numbered watersheds");
            (watersheds, rows)
        };

        let soils_dissolved = {
            let _step = info_span!("dissolve_soils").entered();
            let mut groups = engine.read_column(&soils, &fields.soil_group)?;
            let rewritten = normalize_soil_column(&mut groups)?;
            if rewritten > 0 {
                engine.write_column(&soils, &fields.soil_group, &groups)?;
            }
            info!(rewritten, "reduced multi-group soil ratings");
            engine.dissolve(&soils, &fields.soil_group)?
        };

        let intersected = {
            let _step = info_span!("intersect").entered();
            let with_soils = engine.intersect(&[&watersheds, &soils_dissolved])?;
            engine.intersect(&[&with_soils, &land_cover])?
        };

        let mut read = {
            let _step = info_span!("read_overlay").entered();
            engine.add_area_acres(&intersected, &fields.area)?;
            let ids = engine.read_column(&intersected, &fields.watershed_id)?;
            let zones = engine.read_column(&intersected, &fields.zone)?;
            let groups = engine.read_column(&intersected, &fields.soil_group)?;
            let areas = engine.read_column(&intersected, &fields.area)?;
            overlay::polygons_from_columns(&ids, &zones, &groups, &areas)?
        };
        info!(
            polygons = read.polygons.len(),
            rejected = read.rejected.len(),
            "read overlay polygons"
        );
        let ids = join::watershed_ids(&rows, fields)?;
        let summary = self.summarize_overlay(&ids, &mut read);

        {
            let _step = info_span!("write_polygon_values").entered();
            self.write_polygon_values(engine, &intersected, &read)?;
        }

        let output = {
            let _step = info_span!("join").entered();
            let unmatched = join::join_summaries(&mut rows, &summary.report.summaries, fields)?;
            if !unmatched.is_empty() {
                warn!(?unmatched, "watersheds left without curve number totals");
            }
            engine.copy_with_rows(&watersheds, &rows)?
        };

        Ok(CurveNumberRun {
            output,
            report: summary.report,
            skipped_polygons: summary.skipped_polygons,
            rejected: summary.rejected,
        })
    }

    // Per-feature CN, P_Imperv, CNAREA and IpArea columns; unassigned features get zeros
    fn write_polygon_values<G: Geoprocessor>(
        &self,
        engine: &mut G,
        layer: &G::Layer,
        read: &OverlayRead,
    ) -> Result<()> {
        let fields = &self.config.fields;
        let zeros = vec!["0".to_string(); read.row_count];
        let (mut cn, mut percent, mut cn_area, mut impervious) =
            (zeros.clone(), zeros.clone(), zeros.clone(), zeros);
        for (&row, polygon) in read.rows.iter().zip(&read.polygons) {
            if let Some(assignment) = polygon.assignment {
                cn[row] = assignment.curve_number.to_string();
                percent[row] = assignment.percent_impervious.to_string();
                cn_area[row] = format!("{:.4}", assignment.cn_area);
                impervious[row] = format!("{:.4}", assignment.impervious_area);
            }
        }
        engine.write_column(layer, &fields.curve_number, &cn)?;
        engine.write_column(layer, &fields.percent_impervious, &percent)?;
        engine.write_column(layer, &fields.cn_area, &cn_area)?;
        engine.write_column(layer, &fields.impervious_area, &impervious)?;
        Ok(())
    }

    /// Assign and aggregate overlay polygons read record by record.
    ///
    /// Records that failed to read fail their watershed the same way a
    /// failed lookup does. Rows without a readable id are passed through.
    pub fn summarize_overlay(
        &self,
        expected: &[WatershedId],
        read: &mut OverlayRead,
    ) -> OverlaySummary {
        let failures = std::mem::take(&mut read.failures);
        let (report, skipped_polygons) = self.summarize(expected, &mut read.polygons, failures);
        OverlaySummary {
            report,
            skipped_polygons,
            rejected: std::mem::take(&mut read.rejected),
        }
    }

    /// Assign and aggregate overlay polygons.
    ///
    /// A polygon that fails normalization or lookup fails its whole
    /// watershed; other watersheds are unaffected. Watersheds in `expected`
    /// with no polygons fail with a zero-area error.
    pub fn summarize_polygons(
        &self,
        expected: &[WatershedId],
        polygons: &mut [AtomicPolygon],
    ) -> OverlaySummary {
        let (report, skipped_polygons) = self.summarize(expected, polygons, Vec::new());
        OverlaySummary {
            report,
            skipped_polygons,
            rejected: Vec::new(),
        }
    }

    fn summarize(
        &self,
        expected: &[WatershedId],
        polygons: &mut [AtomicPolygon],
        read_failures: Vec<WatershedFailure>,
    ) -> (BatchReport, usize) {
        let _step = info_span!("assign").entered();
        let mut failed: BTreeMap<WatershedId, Error> = BTreeMap::new();
        for failure in read_failures {
            failed.entry(failure.watershed).or_insert(failure.error);
        }
        let mut skipped_polygons = 0;

        for polygon in polygons.iter_mut() {
            if failed.contains_key(&polygon.watershed) {
                continue;
            }
            let outcome = normalize_soil_group(&polygon.soil_group).and_then(|group| {
                polygon.soil_group = group;
                self.assigner.assign_polygon(polygon)
            });
            match outcome {
                Ok(true) => {}
                Ok(false) => skipped_polygons += 1,
                Err(error) => {
                    failed.insert(polygon.watershed, error);
                }
            }
        }

        let healthy: Vec<AtomicPolygon> = polygons
            .iter()
            .filter(|p| !failed.contains_key(&p.watershed))
            .cloned()
            .collect();
        let expected = expected.iter().copied().filter(|id| !failed.contains_key(id));
        let mut report = self.aggregator.aggregate_watersheds(expected, &healthy);

        for (watershed, error) in failed {
            warn!(%watershed, %error, "watershed skipped during assignment");
            report.failures.push(WatershedFailure { watershed, error });
        }
        report.failures.sort_by_key(|f| f.watershed);

        info!(
            summaries = report.summaries.len(),
            failures = report.failures.len(),
            skipped_polygons,
            "aggregated curve numbers"
        );
        (report, skipped_polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assigner::MissingZonePolicy;
    use crate::join::WatershedRecord;
    use approx::assert_relative_eq;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    // Scripted engine: layers are names, geometry results are canned
    #[derive(Default)]
    struct FakeEngine {
        columns: HashMap<(String, String), Vec<String>>,
        rows: HashMap<String, Vec<WatershedRecord>>,
        acres: Vec<String>,
        calls: Vec<String>,
        copies: usize,
    }

    impl Geoprocessor for FakeEngine {
        type Layer = String;

        fn clip(&mut self, input: &String, boundary: &String) -> Result<String> {
            self.calls.push(format!("clip {input} by {boundary}"));
            let clipped = format!("{input}_clip");
            let copied: Vec<_> = self
                .columns
                .iter()
                .filter(|((layer, _), _)| layer == input)
                .map(|((_, field), values)| ((clipped.clone(), field.clone()), values.clone()))
                .collect();
            self.columns.extend(copied);
            Ok(clipped)
        }

        fn read_column(&self, layer: &String, field: &str) -> Result<Vec<String>> {
            self.columns
                .get(&(layer.clone(), field.to_string()))
                .cloned()
                .ok_or_else(|| Error::input(layer.clone(), format!("no field {field}")))
        }

        fn write_column(&mut self, layer: &String, field: &str, values: &[String]) -> Result<()> {
            self.calls.push(format!("write {layer}.{field}"));
            self.columns
                .insert((layer.clone(), field.to_string()), values.to_vec());
            Ok(())
        }

        fn dissolve(&mut self, layer: &String, field: &str) -> Result<String> {
            self.calls.push(format!("dissolve {layer} on {field}"));
            Ok(format!("{layer}_dissolved"))
        }

        fn intersect(&mut self, layers: &[&String]) -> Result<String> {
            let names: Vec<&str> = layers.iter().map(|l| l.as_str()).collect();
            self.calls.push(format!("intersect {}", names.join(" x ")));
            Ok(names.join("_x_"))
        }

        fn add_area_acres(&mut self, layer: &String, field: &str) -> Result<()> {
            self.calls.push(format!("area {layer}.{field}"));
            self.columns
                .insert((layer.clone(), field.to_string()), self.acres.clone());
            Ok(())
        }

        fn attribute_rows(&self, layer: &String) -> Result<Vec<WatershedRecord>> {
            Ok(self.rows.get(layer).cloned().unwrap_or_default())
        }

        fn copy_with_rows(&mut self, _layer: &String, rows: &[WatershedRecord]) -> Result<String> {
            self.copies += 1;
            let name = format!("watersheds_{}", self.copies);
            self.rows.insert(name.clone(), rows.to_vec());
            Ok(name)
        }
    }

    fn engine() -> FakeEngine {
        let mut engine = FakeEngine::default();
        engine.columns.insert(
            ("soils".to_string(), "hydgrpdcd".to_string()),
            vec!["B".to_string(), "C/D".to_string()],
        );
        let rows = vec![
            json!({"NAME": "Upper"}).as_object().cloned().unwrap(),
            json!({"NAME": "Lower"}).as_object().cloned().unwrap(),
        ];
        engine.rows.insert("watersheds".to_string(), rows);
        // Third feature lost its id in the intersect
        let text = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        for (field, values) in [
            ("WSID", text(&["0", "0", ""])),
            ("ZONE", text(&["R5", "R5", "R5"])),
            ("hydgrpdcd", text(&["B", "C", "B"])),
        ] {
            engine
                .columns
                .insert((OVERLAY.to_string(), field.to_string()), values);
        }
        engine.acres = text(&["2.0", "3.0", "1.0"]);
        engine
    }

    const OVERLAY: &str = "watersheds_1_x_soils_clip_dissolved_x_landcover_clip";

    fn column(engine: &FakeEngine, field: &str) -> Vec<String> {
        engine.columns[&(OVERLAY.to_string(), field.to_string())].clone()
    }

    fn inputs() -> CurveNumberInputs<String> {
        CurveNumberInputs {
            land_cover: "landcover".to_string(),
            soils: "soils".to_string(),
            watersheds: "watersheds".to_string(),
        }
    }

    #[test]
    fn run_drives_engine_and_joins_totals() {
        let mut engine = engine();
        let tool = CurveNumberTool::new(ToolConfig::default()).unwrap();
        let run = tool.run(&mut engine, &inputs()).unwrap();

        assert_eq!(
            engine.calls,
            vec![
                "clip soils by watersheds",
                "clip landcover by watersheds",
                "write soils_clip.hydgrpdcd",
                "dissolve soils_clip on hydgrpdcd",
                "intersect watersheds_1 x soils_clip_dissolved",
                "intersect watersheds_1_x_soils_clip_dissolved x landcover_clip",
                "area watersheds_1_x_soils_clip_dissolved_x_landcover_clip.POLY_AREA",
                "write watersheds_1_x_soils_clip_dissolved_x_landcover_clip.CN",
                "write watersheds_1_x_soils_clip_dissolved_x_landcover_clip.P_Imperv",
                "write watersheds_1_x_soils_clip_dissolved_x_landcover_clip.CNAREA",
                "write watersheds_1_x_soils_clip_dissolved_x_landcover_clip.IpArea",
            ]
        );
        assert_eq!(column(&engine, "CN"), vec!["75", "83", "0"]);
        assert_eq!(column(&engine, "P_Imperv"), vec!["35", "35", "0"]);
        assert_eq!(column(&engine, "CNAREA"), vec!["150.0000", "249.0000", "0"]);
        assert_eq!(column(&engine, "IpArea"), vec!["0.7000", "1.0500", "0"]);
        assert_eq!(run.rejected.len(), 1);
        assert_eq!(run.rejected[0].row, 2);
        assert_eq!(
            engine.columns[&("soils_clip".to_string(), "hydgrpdcd".to_string())],
            vec!["B", "D"]
        );

        let rows = &engine.rows[&run.output];
        assert_eq!(rows[0]["WSID"], json!(0));
        assert_eq!(rows[0]["CN_Total"], json!(80));
        assert_eq!(rows[0]["NAME"], json!("Upper"));
        // Lower has no overlay polygons
        assert_eq!(rows[1].get("CN_Total"), None::<&Value>);
        assert_eq!(run.report.failures.len(), 1);
        assert_eq!(run.report.failures[0].watershed, WatershedId(1));
        assert!(matches!(run.report.failures[0].error, Error::Domain { .. }));
    }

    #[test]
    fn bad_zone_fails_only_its_watershed() {
        let tool = CurveNumberTool::new(ToolConfig::default()).unwrap();
        let mut polygons = vec![
            AtomicPolygon::new(WatershedId(1), "R5", "B", 2.0),
            AtomicPolygon::new(WatershedId(2), "IND", "B", 1.0),
            AtomicPolygon::new(WatershedId(2), "R5", "B", 1.0),
        ];
        let summary = tool.summarize_polygons(&[], &mut polygons);

        assert_eq!(summary.report.summaries.len(), 1);
        assert_eq!(summary.report.summaries[0].total_cn, 75);
        assert_eq!(summary.report.failures.len(), 1);
        assert_eq!(summary.report.failures[0].watershed, WatershedId(2));
        assert!(matches!(
            summary.report.failures[0].error,
            Error::Configuration { .. }
        ));
    }

    #[test]
    fn unreadable_record_fails_only_its_watershed() {
        let tool = CurveNumberTool::new(ToolConfig::default()).unwrap();
        let mut read = overlay::polygons_from_json(&[
            json!({"watershed": 1, "zone": "R5", "soil_group": "B", "area": 2.0}),
            json!({"watershed": 1, "zone": "R5", "soil_group": "C", "area": 3.0}),
            json!({"watershed": 2, "soil_group": "B", "area": 1.0}),
            json!({"watershed": 2, "zone": "R5", "soil_group": "B", "area": 1.0}),
        ]);
        let summary = tool.summarize_overlay(&[WatershedId(1), WatershedId(2)], &mut read);

        assert_eq!(summary.report.summary(WatershedId(1)).unwrap().total_cn, 80);
        assert!(summary.report.summary(WatershedId(2)).is_none());
        assert_eq!(summary.report.failures.len(), 1);
        assert_eq!(summary.report.failures[0].watershed, WatershedId(2));
        assert!(matches!(summary.report.failures[0].error, Error::Input { .. }));
        assert!(summary.rejected.is_empty());
    }

    #[test]
    fn skip_policy_counts_unassigned_polygons() {
        let config = ToolConfig {
            missing_zone: MissingZonePolicy::Skip,
            ..ToolConfig::default()
        };
        let tool = CurveNumberTool::new(config).unwrap();
        let mut polygons = vec![
            AtomicPolygon::new(WatershedId(1), "R5", "A/B", 2.0),
            AtomicPolygon::new(WatershedId(1), "IND", "B", 2.0),
        ];
        let summary = tool.summarize_polygons(&[WatershedId(1)], &mut polygons);

        assert_eq!(summary.skipped_polygons, 1);
        assert_eq!(polygons[0].soil_group, "B");
        let totals = summary.report.summary(WatershedId(1)).unwrap();
        assert_relative_eq!(totals.total_area, 4.0);
        assert_eq!(totals.total_cn, 38);
    }
}
