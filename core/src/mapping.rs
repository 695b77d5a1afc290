//! Column -> destination field mapping.

use rimport_types::{DestField, FieldMapping, UnknownFieldError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("required field {field} ({}) is not mapped to a column", field.label())]
    MissingRequired { field: DestField },
    #[error("field {field} is mapped to column {header:?}, which is not in the CSV header")]
    UnknownColumn { field: DestField, header: String },
    #[error("invalid mapping {raw:?}: expected FIELD=COLUMN")]
    Malformed { raw: String },
    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),
}

/// Guess a mapping from header names.
///
/// Each header is matched (case-insensitively, by substring) against the first
/// applicable rule; a later header that matches the same field replaces the
/// earlier one.
#[must_use]
pub fn guess_mapping(headers: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::new();
    for header in headers {
        if let Some(field) = guess_field(header) {
            mapping.set(field, header.as_str());
        }
    }
    mapping
}

fn guess_field(header: &str) -> Option<DestField> {
    let lower = header.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has("title") || has("name") {
        Some(DestField::Title)
    } else if has("tag") || has("short") {
        Some(DestField::TagLine)
    } else if has("desc") || has("content") {
        Some(DestField::Description)
    } else if has("ver") {
        Some(DestField::Version)
    } else if has("url") || has("link") {
        Some(DestField::ExternalUrl)
    } else if has("price") || has("cost") {
        Some(DestField::Price)
    } else if has("currency") {
        Some(DestField::Currency)
    } else {
        None
    }
}

/// Apply `field=Column` assignments on top of `mapping`.
///
/// `field=` with nothing after the `=` unmaps the field.
pub fn apply_overrides<S: AsRef<str>>(
    mapping: &mut FieldMapping,
    overrides: &[S],
) -> Result<(), MappingError> {
    for raw in overrides {
        let raw = raw.as_ref();
        let Some((field, header)) = raw.split_once('=') else {
            return Err(MappingError::Malformed {
                raw: raw.to_string(),
            });
        };
        let field: DestField = field.parse()?;
        let header = header.trim();
        if header.is_empty() {
            mapping.clear(field);
        } else {
            mapping.set(field, header);
        }
    }
    Ok(())
}

/// Check that required fields are mapped and every mapped column exists.
pub fn validate_mapping(mapping: &FieldMapping, headers: &[String]) -> Result<(), MappingError> {
    if let Some(field) = mapping.missing_required().into_iter().next() {
        return Err(MappingError::MissingRequired { field });
    }
    for (field, header) in mapping.iter() {
        if !headers.iter().any(|h| h == header) {
            return Err(MappingError::UnknownColumn {
                field,
                header: header.to_string(),
            });
        }
    }
    Ok(())
}
