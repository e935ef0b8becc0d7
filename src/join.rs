use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::aggregate::{WatershedId, WatershedSummary};
use crate::config::FieldNames;
use crate::error::{Error, Result};

// Attribute row of a watershed boundary feature
pub type WatershedRecord = Map<String, Value>;

// Give every record its feature index as id, like the FID copied into WSID
pub fn number_watersheds(records: &mut [WatershedRecord], fields: &FieldNames) {
    for (fid, record) in records.iter_mut().enumerate() {
        record.insert(fields.watershed_id.clone(), Value::from(fid as i64));
    }
}

// Whole-number doubles are accepted, shapefile exports often store ids that way
fn watershed_id(
    row: usize,
    record: &WatershedRecord,
    fields: &FieldNames,
) -> Result<WatershedId> {
    let value = record.get(&fields.watershed_id).ok_or_else(|| {
        Error::input(
            format!("watershed row {row}"),
            format!("missing id field '{}'", fields.watershed_id),
        )
    })?;
    WatershedId::from_value(value).ok_or_else(|| {
        Error::input(
            format!("watershed row {row}"),
            format!("id field '{}' is not an integer: {value}", fields.watershed_id),
        )
    })
}

pub fn watershed_ids(records: &[WatershedRecord], fields: &FieldNames) -> Result<Vec<WatershedId>> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| watershed_id(row, record, fields))
        .collect()
}

/// Copy each summary onto the watershed records sharing its id.
///
/// Records without a summary are left as they are; their ids are returned so
/// the caller can report them.
pub fn join_summaries(
    records: &mut [WatershedRecord],
    summaries: &[WatershedSummary],
    fields: &FieldNames,
) -> Result<Vec<WatershedId>> {
    let by_id: HashMap<WatershedId, &WatershedSummary> =
        summaries.iter().map(|s| (s.watershed, s)).collect();

    let mut unmatched = Vec::new();
    for (row, record) in records.iter_mut().enumerate() {
        let id = watershed_id(row, record, fields)?;
        match by_id.get(&id) {
            Some(summary) => {
                record.insert(fields.total_cn.clone(), Value::from(summary.total_cn));
                record.insert(
                    fields.total_percent_impervious.clone(),
                    Value::from(summary.total_percent_impervious),
                );
                record.insert(fields.total_area.clone(), Value::from(summary.total_area));
            }
            None => unmatched.push(id),
        }
    }
    Ok(unmatched)
}
