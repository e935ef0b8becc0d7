use tracing::debug;

use crate::error::{Error, Result};

/// Reduce a hydrologic soil group rating to a single group letter.
///
/// Soil surveys tag some map units with dual ratings such as "A/D" or "B/D"
/// (drained/undrained). The last letter is the most restrictive rating and is
/// the one kept, so runoff estimates stay conservative. A single letter is
/// returned unchanged.
pub fn normalize_soil_group(group: &str) -> Result<String> {
    let trimmed = group.trim();
    match trimmed.chars().last() {
        Some(last) => Ok(last.to_string()),
        None => Err(Error::input(
            format!("soil group '{group}'"),
            "hydrologic soil group is empty",
        )),
    }
}

// Normalize every value of a soil group column in place, returns the number of rewritten values
pub fn normalize_soil_column(values: &mut [String]) -> Result<usize> {
    let mut rewritten = 0;
    for value in values.iter_mut() {
        let normalized = normalize_soil_group(value)?;
        if *value != normalized {
            debug!(from = %value, to = %normalized, "reduced soil group rating");
            *value = normalized;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}
