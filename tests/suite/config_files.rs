//! Config and CSV files on disk

use std::io::Write;

use rimport_config::{ConfigError, Overrides, RimportConfig};
use rimport_core::CsvReader;
use rimport_types::DestField;
use tempfile::NamedTempFile;

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn config_file_resolves_with_flag_overrides() {
    let file = write_temp(
        br#"
[forum]
base_url = "https://forum.example.com/"
api_key = "${RIMPORT_TEST_KEY}"
category_id = 4

[proxy]
enabled = true

[import]
delay_ms = 250
delimiter = ";"

[mapping]
title = "Resource"
"#,
    );

    let config = RimportConfig::load_from(file.path()).unwrap();
    let overrides = Overrides {
        category_id: Some(9),
        ..Overrides::default()
    };
    let settings = config
        .resolve(&overrides, |name| {
            (name == "RIMPORT_TEST_KEY").then(|| "from-env".to_string())
        })
        .unwrap();

    assert_eq!(settings.site.base_url.as_str(), "https://forum.example.com");
    assert_eq!(settings.site.api_key.expose_secret(), "from-env");
    assert_eq!(settings.site.category_id.get(), 9);
    assert_eq!(
        settings.site.proxy.as_ref().map(|p| p.as_str()),
        Some("https://corsproxy.io/?")
    );
    assert_eq!(settings.import.delimiter, b';');
    assert_eq!(settings.import.delay.as_millis(), 250);
    assert_eq!(settings.mapping.get(DestField::Title), Some("Resource"));
}

#[test]
fn malformed_config_reports_its_path() {
    let file = write_temp(b"[forum\nbase_url = ");
    let err = RimportConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), Some(file.path()));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RimportConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn csv_file_with_utf8_bom() {
    let file = write_temp(b"\xEF\xBB\xBFTitle,Description\nCaf\xC3\xA9,Menu\n");
    let table = CsvReader::new().read_file(file.path()).unwrap();
    assert_eq!(table.headers, vec!["Title", "Description"]);
    assert_eq!(table.rows[0].get("Title"), Some("Café"));
}

#[test]
fn csv_file_in_windows_1252() {
    let file = write_temp(b"Title,Description\nCaf\xE9,\x93quoted\x94\n");
    let table = CsvReader::new().read_file(file.path()).unwrap();
    assert_eq!(table.rows[0].get("Title"), Some("Café"));
    assert_eq!(table.rows[0].get("Description"), Some("\u{201c}quoted\u{201d}"));
}

#[test]
fn csv_file_with_tab_delimiter() {
    let file = write_temp(b"Title\tDescription\nA, with comma\tB\n");
    let table = CsvReader::new()
        .with_delimiter(b'\t')
        .read_file(file.path())
        .unwrap();
    assert_eq!(table.rows[0].get("Title"), Some("A, with comma"));
}
