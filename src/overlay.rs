use serde_json::Value;
use tracing::warn;

use crate::aggregate::{WatershedFailure, WatershedId};
use crate::assigner::AtomicPolygon;
use crate::error::{Error, Result};

// Overlay row whose watershed id could not be read, so no watershed can own the failure
#[derive(Debug)]
pub struct RejectedRecord {
    pub row: usize,
    pub error: Error,
}

/// Overlay polygons read one record at a time.
///
/// A record with a bad attribute fails its watershed through `failures`
/// instead of the whole read; `rows` holds the source row of each polygon.
#[derive(Debug, Default)]
pub struct OverlayRead {
    pub polygons: Vec<AtomicPolygon>,
    pub rows: Vec<usize>,
    pub row_count: usize,
    pub failures: Vec<WatershedFailure>,
    pub rejected: Vec<RejectedRecord>,
}

impl OverlayRead {
    fn push(&mut self, row: usize, polygon: AtomicPolygon) {
        self.polygons.push(polygon);
        self.rows.push(row);
    }

    fn fail(&mut self, watershed: WatershedId, error: Error) {
        warn!(%watershed, %error, "overlay record rejected");
        self.failures.push(WatershedFailure { watershed, error });
    }

    fn reject(&mut self, row: usize, error: Error) {
        warn!(row, %error, "overlay record has no usable watershed id");
        self.rejected.push(RejectedRecord { row, error });
    }
}

// Exported overlay records: {"watershed", "zone", "soil_group", "area"}
pub fn polygons_from_json(records: &[Value]) -> OverlayRead {
    let mut read = OverlayRead {
        row_count: records.len(),
        ..OverlayRead::default()
    };
    for (row, record) in records.iter().enumerate() {
        let watershed = match record.get("watershed") {
            Some(value) => WatershedId::from_value(value).ok_or_else(|| {
                Error::input(
                    format!("overlay row {row}"),
                    format!("watershed id is not an integer: {value}"),
                )
            }),
            None => Err(Error::input(
                format!("overlay row {row}"),
                "missing field 'watershed'",
            )),
        };
        let watershed = match watershed {
            Ok(id) => id,
            Err(error) => {
                read.reject(row, error);
                continue;
            }
        };

        let attributes = text_field(record, "zone").and_then(|zone| {
            let soil_group = text_field(record, "soil_group")?;
            let area = area_field(record)?;
            Ok(AtomicPolygon::new(watershed, &zone, &soil_group, area))
        });
        match attributes {
            Ok(polygon) => read.push(row, polygon),
            Err(message) => read.fail(
                watershed,
                Error::input(format!("overlay row {row} of {watershed}"), message),
            ),
        }
    }
    read
}

fn text_field(record: &Value, key: &str) -> std::result::Result<String, String> {
    match record.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(format!("field '{key}' is not text: {other}")),
        None => Err(format!("missing field '{key}'")),
    }
}

fn area_field(record: &Value) -> std::result::Result<f64, String> {
    match record.get("area") {
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| format!("area is not a number: {number}")),
        Some(Value::String(text)) => text
            .trim()
            .parse()
            .map_err(|_| format!("area is not a number: '{text}'")),
        Some(other) => Err(format!("area is not a number: {other}")),
        None => Err("missing field 'area'".to_string()),
    }
}

/// Overlay polygons from attribute columns of the intersected layer.
///
/// Columns must have one value per feature. The area column holds acres.
pub fn polygons_from_columns(
    ids: &[String],
    zones: &[String],
    soil_groups: &[String],
    areas: &[String],
) -> Result<OverlayRead> {
    let rows = ids.len();
    if zones.len() != rows || soil_groups.len() != rows || areas.len() != rows {
        return Err(Error::input(
            "overlay layer",
            format!(
                "attribute columns differ in length: {rows} ids, {} zones, {} soil groups, {} areas",
                zones.len(),
                soil_groups.len(),
                areas.len()
            ),
        ));
    }

    let mut read = OverlayRead {
        row_count: rows,
        ..OverlayRead::default()
    };
    let features = ids.iter().zip(zones).zip(soil_groups).zip(areas).enumerate();
    for (row, (((id, zone), soil_group), area)) in features {
        let Some(watershed) = WatershedId::from_text(id) else {
            read.reject(
                row,
                Error::input(
                    format!("overlay row {row}"),
                    format!("watershed id '{id}' is not an integer"),
                ),
            );
            continue;
        };
        match area.trim().parse::<f64>() {
            Ok(acres) => read.push(row, AtomicPolygon::new(watershed, zone, soil_group, acres)),
            Err(_) => read.fail(
                watershed,
                Error::input(
                    format!("overlay row {row} of {watershed}"),
                    format!("area '{area}' is not a number"),
                ),
            ),
        }
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bad_record_fails_only_its_watershed() {
        let records = vec![
            json!({"watershed": 1, "zone": "R5", "soil_group": "B", "area": 2.0}),
            json!({"watershed": 1, "zone": "R5", "soil_group": "C", "area": 3.0}),
            json!({"watershed": 2, "soil_group": "B", "area": 1.0}),
        ];
        let read = polygons_from_json(&records);

        assert_eq!(read.polygons.len(), 2);
        assert_eq!(read.rows, vec![0, 1]);
        assert_eq!(read.failures.len(), 1);
        assert_eq!(read.failures[0].watershed, WatershedId(2));
        match &read.failures[0].error {
            Error::Input { record, message } => {
                assert_eq!(record, "overlay row 2 of WSID 2");
                assert!(message.contains("zone"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(read.rejected.is_empty());
    }

    #[test]
    fn unreadable_id_is_rejected_with_its_row() {
        let records = vec![
            json!({"zone": "R5", "soil_group": "B", "area": 2.0}),
            json!({"watershed": 1.0, "zone": "R5", "soil_group": "B", "area": "2.5"}),
            json!({"watershed": "north", "zone": "R5", "soil_group": "B", "area": 1.0}),
        ];
        let read = polygons_from_json(&records);

        assert_eq!(read.row_count, 3);
        assert_eq!(read.polygons, vec![AtomicPolygon::new(WatershedId(1), "R5", "B", 2.5)]);
        let rows: Vec<usize> = read.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 2]);
        assert!(matches!(read.rejected[1].error, Error::Input { .. }));
    }

    #[test]
    fn columns_are_read_per_feature() {
        let text = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let read = polygons_from_columns(
            &text(&["0", "0", "1.0", ""]),
            &text(&["R5", "CG", "RR", "R5"]),
            &text(&["B", "D", "C", "B"]),
            &text(&["2.0", "n/a", "1.25", "1.0"]),
        )
        .unwrap();

        assert_eq!(read.rows, vec![0, 2]);
        assert_eq!(read.polygons[1], AtomicPolygon::new(WatershedId(1), "RR", "C", 1.25));
        assert_eq!(read.failures[0].watershed, WatershedId(0));
        assert_eq!(read.rejected[0].row, 3);

        let short = polygons_from_columns(&text(&["0"]), &[], &[], &[]);
        assert!(matches!(short, Err(Error::Input { .. })));
    }
}
