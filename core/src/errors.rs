//! Human-readable rendering of upload failures.

use rimport_types::ApiError;

/// Join API errors as `[code] message | [code] message`.
///
/// An empty list renders as `Unknown error`.
#[must_use]
pub fn format_api_errors(errors: &[ApiError]) -> String {
    if errors.is_empty() {
        return "Unknown error".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}
