//! Form payload for the resource create endpoint.

use rimport_types::{CategoryId, CsvRow, DestField, FieldMapping};
use url::form_urlencoded;

/// Version string sent when the row has none.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Ordered form parameters for one `POST /api/resources/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePayload {
    params: Vec<(&'static str, String)>,
}

impl ResourcePayload {
    /// Build the payload for one row.
    ///
    /// `tag_line` and `description` are passed in already resolved (generated,
    /// truncated, or enhanced); everything else is read through `mapping`.
    #[must_use]
    pub fn build(
        category_id: CategoryId,
        row: &CsvRow,
        mapping: &FieldMapping,
        title: &str,
        tag_line: &str,
        description: &str,
    ) -> Self {
        let mut payload = Self::default();
        payload.push("resource_category_id", category_id.to_string());
        payload.push(DestField::Title.as_str(), title);
        payload.push(DestField::TagLine.as_str(), tag_line);
        payload.push(DestField::Description.as_str(), description);

        let version = mapped_value(row, mapping, DestField::Version).unwrap_or(DEFAULT_VERSION);
        payload.push(DestField::Version.as_str(), version);

        if let Some(url) = mapped_value(row, mapping, DestField::ExternalUrl) {
            payload.push(DestField::ExternalUrl.as_str(), url);
            // No file is uploaded, so the resource is fileless.
            payload.push("is_fileless", "1");
        }

        for field in [DestField::Price, DestField::Currency] {
            if let Some(value) = mapped_value(row, mapping, field) {
                payload.push(field.as_str(), value);
            }
        }

        payload
    }

    fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.params.push((name, value.into()));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.params.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Non-empty value of the column mapped to `field`.
fn mapped_value<'a>(row: &'a CsvRow, mapping: &FieldMapping, field: DestField) -> Option<&'a str> {
    let header = mapping.get(field)?;
    row.get(header).filter(|value| !value.is_empty())
}
