//! Destination fields of a resource and the CSV columns mapped onto them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A field of the resource-manager create endpoint that a CSV column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestField {
    Title,
    TagLine,
    Description,
    Version,
    ExternalUrl,
    Price,
    Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field {0:?} (expected one of: {names})", names = field_names())]
pub struct UnknownFieldError(pub String);

fn field_names() -> String {
    DestField::ALL
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DestField {
    pub const ALL: [DestField; 7] = [
        DestField::Title,
        DestField::TagLine,
        DestField::Description,
        DestField::Version,
        DestField::ExternalUrl,
        DestField::Price,
        DestField::Currency,
    ];

    /// Form parameter name used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DestField::Title => "title",
            DestField::TagLine => "tag_line",
            DestField::Description => "description",
            DestField::Version => "version_string",
            DestField::ExternalUrl => "external_purchase_url",
            DestField::Price => "price",
            DestField::Currency => "currency",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DestField::Title => "Resource Title",
            DestField::TagLine => "Tag Line",
            DestField::Description => "Description",
            DestField::Version => "Version String",
            DestField::ExternalUrl => "Download/Purchase URL",
            DestField::Price => "Price",
            DestField::Currency => "Currency",
        }
    }

    /// Title and description must be mapped before an import can start.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, DestField::Title | DestField::Description)
    }
}

impl fmt::Display for DestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestField {
    type Err = UnknownFieldError;

    /// Accepts the API name plus a few short aliases (`tagline`, `version`, `url`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "title" => Ok(DestField::Title),
            "tag_line" | "tagline" => Ok(DestField::TagLine),
            "description" | "desc" => Ok(DestField::Description),
            "version_string" | "version" => Ok(DestField::Version),
            "external_purchase_url" | "external_url" | "url" => Ok(DestField::ExternalUrl),
            "price" => Ok(DestField::Price),
            "currency" => Ok(DestField::Currency),
            _ => Err(UnknownFieldError(s.to_string())),
        }
    }
}

/// Destination field -> CSV header name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<DestField, String>);

impl FieldMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Header mapped to `field`, if any. Blank headers count as unmapped.
    #[must_use]
    pub fn get(&self, field: DestField) -> Option<&str> {
        self.0
            .get(&field)
            .map(String::as_str)
            .filter(|header| !header.is_empty())
    }

    pub fn set(&mut self, field: DestField, header: impl Into<String>) {
        let header = header.into();
        if header.is_empty() {
            self.0.remove(&field);
        } else {
            self.0.insert(field, header);
        }
    }

    pub fn clear(&mut self, field: DestField) {
        self.0.remove(&field);
    }

    #[must_use]
    pub fn is_mapped(&self, field: DestField) -> bool {
        self.get(field).is_some()
    }

    /// Required fields with no column assigned.
    #[must_use]
    pub fn missing_required(&self) -> Vec<DestField> {
        DestField::ALL
            .into_iter()
            .filter(|field| field.is_required() && !self.is_mapped(*field))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DestField, &str)> {
        self.0
            .iter()
            .filter(|(_, header)| !header.is_empty())
            .map(|(field, header)| (*field, header.as_str()))
    }
}
