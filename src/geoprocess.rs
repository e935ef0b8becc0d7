use crate::error::Result;
use crate::join::WatershedRecord;

/// Operations the host GIS engine performs on vector layers.
///
/// Geometry never crosses this boundary: the curve number tool decides which
/// fields to dissolve on and what to write, the engine does the clipping,
/// dissolving, intersecting and feature I/O.
pub trait Geoprocessor {
    // Engine-side handle of a feature layer
    type Layer;

    // Restrict `input` to the extent of `boundary`
    fn clip(&mut self, input: &Self::Layer, boundary: &Self::Layer) -> Result<Self::Layer>;

    fn read_column(&self, layer: &Self::Layer, field: &str) -> Result<Vec<String>>;

    fn write_column(&mut self, layer: &Self::Layer, field: &str, values: &[String]) -> Result<()>;

    // Merge features sharing the value of `field` into multipart features
    fn dissolve(&mut self, layer: &Self::Layer, field: &str) -> Result<Self::Layer>;

    // One output feature per unique combination of input features
    fn intersect(&mut self, layers: &[&Self::Layer]) -> Result<Self::Layer>;

    // Add or recompute a per-feature area column, in acres
    fn add_area_acres(&mut self, layer: &Self::Layer, field: &str) -> Result<()>;

    fn attribute_rows(&self, layer: &Self::Layer) -> Result<Vec<WatershedRecord>>;

    // Copy `layer` with replaced attribute rows, in feature order
    fn copy_with_rows(&mut self, layer: &Self::Layer, rows: &[WatershedRecord]) -> Result<Self::Layer>;
}
