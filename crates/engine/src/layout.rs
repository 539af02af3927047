//! Names of groups, datasets and attributes in a store file.
//!
//! Every region is one top-level group. Tensor regions hold the `input` and
//! `output` datasets, tabular regions hold `data`. Datasets carry the scalar
//! type id in `type`; groups carry enough attributes to rebuild the region
//! list without outside knowledge.

/// Dataset of a tabular region.
pub const TABULAR_DATASET: &str = "data";

/// Dataset attribute: persisted scalar type id.
pub const TYPE_ATTR: &str = "type";

/// Group attribute: region kind (`tensor` or `tabular`).
pub const KIND_ATTR: &str = "kind";

/// Group attribute: source address of the region.
pub const ADDRESS_ATTR: &str = "address";

/// Group attribute: name requested at creation, before any suffix.
pub const NAME_ATTR: &str = "name";

/// Group attribute: chunk row hint given at creation.
pub const CHUNK_ROWS_ATTR: &str = "chunk_rows";

/// Tabular group attributes describing the column layout.
pub const INPUT_TYPES_ATTR: &str = "input_types";
/// Element count of each input variable.
pub const INPUT_ELEMENTS_ATTR: &str = "input_elements";
/// Scalar type id of each output variable.
pub const OUTPUT_TYPES_ATTR: &str = "output_types";
/// Element count of each output variable.
pub const OUTPUT_ELEMENTS_ATTR: &str = "output_elements";

/// Path of a dataset for messages: `group/dataset`.
pub fn dataset_path(group: &str, dataset: &str) -> String {
    format!("{}/{}", group, dataset)
}
