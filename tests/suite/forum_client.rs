//! Forum client behavior against a mock XenForo API

use rimport_core::ResourcePayload;
use rimport_providers::{ConnectionError, ForumClient};
use rimport_types::{ApiError, CategoryId, CsvRow, DestField, FieldMapping, ForumSite, ProxyPrefix};
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    TEST_API_KEY, TEST_CATEGORY, closed_port_url, direct_site, form_value, mount_category,
    mount_resource_created, mount_resource_rejected, proxied_site, site_at, site_with_user,
};

fn sample_payload() -> ResourcePayload {
    let mut row = CsvRow::new();
    row.insert("Name", "Widget Pro");
    row.insert("Body", "Does widget things & more");
    row.insert("Link", "https://shop.test/widget");
    let mut mapping = FieldMapping::new();
    mapping.set(DestField::Title, "Name");
    mapping.set(DestField::Description, "Body");
    mapping.set(DestField::ExternalUrl, "Link");
    ResourcePayload::build(
        CategoryId::new(TEST_CATEGORY).unwrap(),
        &row,
        &mapping,
        "Widget Pro",
        "Widgets, faster",
        "Does widget things & more",
    )
}

#[tokio::test]
async fn connection_check_returns_category_title() {
    let server = MockServer::start().await;
    mount_category(&server, "Add-ons").await;

    let client = ForumClient::new(direct_site(&server)).unwrap();
    let category = client.test_connection().await.unwrap();

    assert_eq!(category.title, "Add-ons");
    assert_eq!(category.id.get(), TEST_CATEGORY);
}

#[tokio::test]
async fn direct_requests_send_api_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/resource-categories/2/"))
        .and(header("XF-Api-Key", TEST_API_KEY))
        .and(header("Accept", "application/json"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("XF-Api-User", "7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "category": { "title": "Styles" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ForumClient::new(site_with_user(&server, 7)).unwrap();
    let category = client.test_connection().await.unwrap();
    assert_eq!(category.title, "Styles");
}

#[tokio::test]
async fn no_user_header_without_user_id() {
    let server = MockServer::start().await;
    mount_category(&server, "Add-ons").await;

    let client = ForumClient::new(direct_site(&server)).unwrap();
    client.test_connection().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("XF-Api-User").is_none());
}

#[tokio::test]
async fn proxied_requests_wrap_target_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .and(query_param(
            "url",
            "https://forum.test/api/resource-categories/2/",
        ))
        .and(header_exists("XF-Api-Key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "category": { "title": "Via proxy" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ForumClient::new(proxied_site(&server, "https://forum.test/")).unwrap();
    let category = client.test_connection().await.unwrap();
    assert_eq!(category.title, "Via proxy");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Requested-With").is_none());
}

#[tokio::test]
async fn proxy_refusal_is_reported_as_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .respond_with(ResponseTemplate::new(403).set_body_string("blocked"))
        .mount(&server)
        .await;

    let client = ForumClient::new(proxied_site(&server, "https://forum.test")).unwrap();
    let err = client.test_connection().await.unwrap_err();
    assert_eq!(err, ConnectionError::ProxyBlocked);
}

#[tokio::test]
async fn connection_check_classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "errors": [{ "code": "not_found", "message": "Not found." }]
        })))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert!(matches!(
        client.test_connection().await,
        Err(ConnectionError::CategoryNotFound(id)) if id.get() == TEST_CATEGORY
    ));

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "errors": [{ "code": "api_key_not_found", "message": "API key provided in request was not found." }]
        })))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::Unauthorized { status: 401 }
    );

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::NotJson { status: 200 }
    );

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::UnexpectedResponse
    );
}

#[tokio::test]
async fn unreachable_forum_is_reported() {
    let client = ForumClient::with_timeout(site_at(&closed_port_url()), 5).unwrap();
    assert!(matches!(
        client.test_connection().await,
        Err(ConnectionError::Unreachable(_))
    ));
}

#[tokio::test]
async fn unreachable_proxy_is_reported_as_blocked() {
    let site = ForumSite {
        proxy: Some(ProxyPrefix::new(&format!("{}/?u=", closed_port_url()))),
        ..site_at("https://forum.test")
    };
    let client = ForumClient::with_timeout(site, 5).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::ProxyBlocked
    );
}

#[tokio::test]
async fn server_error_surfaces_first_api_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "errors": [
                { "code": "db_down", "message": "Database unavailable" },
                { "code": "other", "message": "Second problem" }
            ]
        })))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::Api {
            status: 500,
            message: "Database unavailable".into()
        }
    );

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::Api {
            status: 500,
            message: "unknown error".into()
        }
    );
}

#[tokio::test]
async fn forbidden_without_proxy_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "errors": [{ "code": "no_permission", "message": "You do not have permission" }]
        })))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::Unauthorized { status: 403 }
    );
}

#[tokio::test]
async fn redirect_is_reported_with_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", "https://forum.example.com/api/resource-categories/2/"),
        )
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(
        client.test_connection().await.unwrap_err(),
        ConnectionError::Redirected {
            status: 301,
            location: "https://forum.example.com/api/resource-categories/2/".into()
        }
    );
}

#[tokio::test]
async fn post_resource_sends_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "resource": { "resource_id": 42, "title": "Widget Pro" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ForumClient::new(direct_site(&server)).unwrap();
    let created = client.post_resource(&sample_payload()).await.unwrap().unwrap();
    assert_eq!(created.resource_id, 42);

    let requests = server.received_requests().await.unwrap();
    let body = &requests[0].body;
    assert_eq!(form_value(body, "resource_category_id").as_deref(), Some("2"));
    assert_eq!(form_value(body, "title").as_deref(), Some("Widget Pro"));
    assert_eq!(form_value(body, "tag_line").as_deref(), Some("Widgets, faster"));
    assert_eq!(
        form_value(body, "description").as_deref(),
        Some("Does widget things & more")
    );
    assert_eq!(form_value(body, "version_string").as_deref(), Some("1.0.0"));
    assert_eq!(
        form_value(body, "external_purchase_url").as_deref(),
        Some("https://shop.test/widget")
    );
    assert_eq!(form_value(body, "is_fileless").as_deref(), Some("1"));
}

#[tokio::test]
async fn post_resource_without_echo_is_still_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .mount(&server)
        .await;

    let client = ForumClient::new(direct_site(&server)).unwrap();
    assert_eq!(client.post_resource(&sample_payload()).await, Ok(None));
}

#[tokio::test]
async fn post_resource_returns_api_errors() {
    let server = MockServer::start().await;
    mount_resource_rejected(
        &server,
        400,
        serde_json::json!([
            { "code": "please_enter_valid_title", "message": "Please enter a valid title." },
            { "code": "invalid_category", "message": "Invalid category." }
        ]),
    )
    .await;

    let client = ForumClient::new(direct_site(&server)).unwrap();
    let errors = client.post_resource(&sample_payload()).await.unwrap_err();
    assert_eq!(
        errors,
        vec![
            ApiError::new("please_enter_valid_title", "Please enter a valid title."),
            ApiError::new("invalid_category", "Invalid category."),
        ]
    );
}

#[tokio::test]
async fn post_resource_classifies_bad_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    let errors = client.post_resource(&sample_payload()).await.unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ApiError::INVALID_RESPONSE);
    assert!(errors[0].message.contains("502"));

    let server = MockServer::start().await;
    mount_resource_rejected(&server, 500, serde_json::json!([])).await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    let errors = client.post_resource(&sample_payload()).await.unwrap_err();
    assert_eq!(errors[0].code, ApiError::HTTP_ERROR);
    assert_eq!(errors[0].message, "HTTP error 500");

    let client = ForumClient::with_timeout(site_at(&closed_port_url()), 5).unwrap();
    let errors = client.post_resource(&sample_payload()).await.unwrap_err();
    assert_eq!(errors[0].code, ApiError::NETWORK_ERROR);
}

#[tokio::test]
async fn post_resource_reports_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://www.forum.test/api/resources/"),
        )
        .mount(&server)
        .await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    let errors = client.post_resource(&sample_payload()).await.unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ApiError::REDIRECTED);
    assert!(errors[0].message.contains("302"));
    assert!(errors[0].message.contains("https://www.forum.test/api/resources/"));
}

#[tokio::test]
async fn created_mock_helper_answers_uploads() {
    let server = MockServer::start().await;
    mount_resource_created(&server, 9).await;
    let client = ForumClient::new(direct_site(&server)).unwrap();
    let created = client.post_resource(&sample_payload()).await.unwrap();
    assert_eq!(created.map(|r| r.resource_id), Some(9));
}
