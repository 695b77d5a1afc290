//! End-to-end import runs against mock forum and Gemini servers

use std::time::Duration;

use rimport_core::{CsvReader, guess_mapping, validate_mapping};
use rimport_engine::{
    Enrichment, ImportEvent, ImportOptions, Importer, LogStatus, RowResult, TAG_LINE_TRUNCATE_CHARS,
};
use rimport_providers::{ForumClient, GeminiClient};
use rimport_types::{ApiKey, CategoryId};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    TEST_CATEGORY, TEST_MODEL, direct_site, form_value, mount_gemini_answer,
    mount_resource_created,
};

const CSV: &str = "\
Name,Short Description,Description,Version,Purchase URL
Widget Pro,,\"Widgets, for professionals\",2.1.0,https://shop.test/pro
Widget Lite,Small and free,A smaller widget,,
,,orphan description,,
";

fn options() -> ImportOptions {
    ImportOptions {
        delay: Duration::ZERO,
        ..ImportOptions::new(CategoryId::new(TEST_CATEGORY).unwrap())
    }
}

#[tokio::test]
async fn imports_csv_with_generated_tag_lines() {
    let forum = MockServer::start().await;
    mount_resource_created(&forum, 55).await;
    let gemini = MockServer::start().await;
    mount_gemini_answer(&gemini, "Pro-grade widgets").await;

    let table = CsvReader::new().parse_str(CSV).unwrap();
    let mapping = guess_mapping(&table.headers);
    validate_mapping(&mapping, &table.headers).unwrap();

    let writer = GeminiClient::new(ApiKey::new("g").unwrap(), TEST_MODEL)
        .unwrap()
        .with_base_url(gemini.uri());
    let importer = Importer::new(
        ForumClient::new(direct_site(&forum)).unwrap(),
        Enrichment::Enabled(writer),
        options(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = importer.run(&table, &mapping, &tx).await;

    assert_eq!(report.stats.total, 3);
    assert_eq!(report.stats.success, 2);
    assert_eq!(report.stats.failed, 1);
    assert!(!report.stats.all_succeeded());

    let uploads = forum.received_requests().await.unwrap();
    assert_eq!(uploads.len(), 2);
    let first = &uploads[0].body;
    assert_eq!(form_value(first, "tag_line").as_deref(), Some("Pro-grade widgets"));
    assert_eq!(
        form_value(first, "description").as_deref(),
        Some("Widgets, for professionals")
    );
    assert_eq!(form_value(first, "version_string").as_deref(), Some("2.1.0"));
    assert_eq!(form_value(first, "is_fileless").as_deref(), Some("1"));

    let second = &uploads[1].body;
    assert_eq!(form_value(second, "tag_line").as_deref(), Some("Small and free"));
    assert_eq!(form_value(second, "version_string").as_deref(), Some("1.0.0"));
    assert_eq!(form_value(second, "external_purchase_url"), None);

    // Only the first row needed a generated tagline.
    assert_eq!(gemini.received_requests().await.unwrap().len(), 1);

    let messages: Vec<_> = report
        .log
        .entries()
        .iter()
        .map(|entry| entry.message.as_str())
        .collect();
    assert_eq!(
        messages,
        vec![
            "Success: Widget Pro",
            "Success: Widget Lite",
            "Row 3: missing title or description",
            "Process finished.",
        ]
    );
    assert_eq!(report.log.count(LogStatus::Error), 1);

    drop(tx);
    let mut finished = None;
    while let Some(event) = rx.recv().await {
        if let ImportEvent::Finished(stats) = event {
            finished = Some(stats);
        }
    }
    assert_eq!(finished, Some(report.stats));
}

#[tokio::test]
async fn failing_gemini_falls_back_to_description() {
    let forum = MockServer::start().await;
    mount_resource_created(&forum, 1).await;
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&gemini)
        .await;

    let csv = format!("Title,Description\nLong one,{}\n", "x".repeat(150));
    let table = CsvReader::new().parse_str(&csv).unwrap();
    let mapping = guess_mapping(&table.headers);

    let writer = GeminiClient::new(ApiKey::new("g").unwrap(), TEST_MODEL)
        .unwrap()
        .with_base_url(gemini.uri());
    let importer = Importer::new(
        ForumClient::new(direct_site(&forum)).unwrap(),
        Enrichment::Enabled(writer),
        options(),
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    let report = importer.run(&table, &mapping, &tx).await;

    assert_eq!(report.stats.success, 1);
    let uploads = forum.received_requests().await.unwrap();
    let tag_line = form_value(&uploads[0].body, "tag_line").unwrap();
    assert_eq!(tag_line, "x".repeat(99));
}

#[tokio::test]
async fn rejected_rows_are_counted_and_logged() {
    let forum = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "errors": [{ "code": "no_permission", "message": "You do not have permission." }]
        })))
        .mount(&forum)
        .await;

    let table = CsvReader::new()
        .parse_str(&format!("Title,Description\nA,{}\n", "d".repeat(120)))
        .unwrap();
    let mapping = guess_mapping(&table.headers);
    let importer: Importer<_, GeminiClient> = Importer::new(
        ForumClient::new(direct_site(&forum)).unwrap(),
        Enrichment::Disabled,
        options(),
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    let report = importer.run(&table, &mapping, &tx).await;

    assert_eq!(report.stats.failed, 1);
    let failure = &report.log.entries()[0];
    assert_eq!(failure.message, "Failed: A");
    assert_eq!(
        failure.details.as_deref(),
        Some("[no_permission] You do not have permission.")
    );
    assert!(matches!(&report.rows[0].result, RowResult::Failed { errors } if errors.len() == 1));

    let uploads = forum.received_requests().await.unwrap();
    let tag_line = form_value(&uploads[0].body, "tag_line").unwrap();
    assert_eq!(tag_line.chars().count(), TAG_LINE_TRUNCATE_CHARS);
}

#[tokio::test]
async fn report_serializes_rows_and_log() {
    let forum = MockServer::start().await;
    mount_resource_created(&forum, 77).await;

    let table = CsvReader::new()
        .parse_str("Title,Description\nA,first\n")
        .unwrap();
    let mapping = guess_mapping(&table.headers);
    let importer: Importer<_, GeminiClient> = Importer::new(
        ForumClient::new(direct_site(&forum)).unwrap(),
        Enrichment::Disabled,
        options(),
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    let report = importer.run(&table, &mapping, &tx).await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["stats"]["success"], 1);
    assert_eq!(json["rows"][0]["status"], "created");
    assert_eq!(json["rows"][0]["resource_id"], 77);
    assert_eq!(json["log"][0]["status"], "success");
    assert_eq!(json["log"][0]["details"], "ID: 77");
}
