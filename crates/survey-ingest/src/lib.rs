//! Survey artifact ingestion.
//!
//! - **csv_table**: all-text CSV dataset artifacts with atomic writes
//! - **registry_file**: the variable mapping registry file contract
//! - **polars_utils**: text-column helpers and stable record ids

pub mod csv_table;
pub mod error;
pub mod polars_utils;
pub mod registry_file;

pub use csv_table::{read_dataset, staging_path, write_dataset};
pub use error::{IngestError, Result};
pub use polars_utils::{
    any_to_string, any_to_string_non_empty, column_names, column_values, frame_from_columns,
    has_column, record_ids, replace_column, text_column,
};
pub use registry_file::{REGISTRY_COLUMNS, read_registry, write_registry};
