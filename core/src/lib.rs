//! Synchronous import pipeline pieces: CSV tokenizer, field mapper, payload builder.
//!
//! Nothing here touches the network; the engine crate drives these per row.

pub mod csv_parser;
pub mod errors;
pub mod mapping;
pub mod payload;

pub use csv_parser::{CsvError, CsvReader};
pub use errors::format_api_errors;
pub use mapping::{MappingError, apply_overrides, guess_mapping, validate_mapping};
pub use payload::{DEFAULT_VERSION, ResourcePayload};
