mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use common::{png_bytes, solid, CountingLoader};
use photograde::analysis::AssessmentPipeline;
use photograde::config::TelegramSettings;
use photograde::locale::Locale;
use photograde::model::ModelRegistry;
use photograde::notify::TelegramNotifier;
use photograde::routes::{configure_routes, AppState};
use serde_json::Value;

const BOUNDARY: &str = "----photograde-test-boundary";

async fn state(load: bool) -> AppState {
    let mut loader = CountingLoader::new(Arc::new(AtomicUsize::new(0)));
    loader.delay = std::time::Duration::ZERO;
    let registry = Arc::new(ModelRegistry::new(loader));
    let pipeline = if load {
        registry.ensure_loaded().await.unwrap();
        AssessmentPipeline::from_registry(&registry).unwrap()
    } else {
        let fallback = ModelRegistry::new(CountingLoader::new(Arc::new(AtomicUsize::new(0))));
        fallback.ensure_loaded().await.unwrap();
        AssessmentPipeline::from_registry(&fallback).unwrap()
    };
    AppState {
        registry,
        pipeline,
        notifier: None,
        send_by_default: false,
    }
}

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/analyze_image")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

#[actix_web::test]
async fn root_reports_running() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let resp: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp["message"], "Image Analysis API is up and running");
}

#[actix_web::test]
async fn health_reflects_registry_state() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let resp: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp["status"], "healthy");
    assert_eq!(resp["models_loaded"], true);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(false).await))
            .configure(configure_routes),
    )
    .await;
    let resp: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp["models_loaded"], false);
}

#[actix_web::test]
async fn analyze_image_returns_report() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let png = png_bytes(&solid(4, 3, [100, 0, 0]));
    let req = upload(multipart_body("file", "Crate.PNG", "image/png", &png)).to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["class_name"], "Excellent");
    assert_eq!(body["defects"], "no");
    assert_eq!(body["type"], "png");
    assert_eq!(body["size"], "4x3");
    assert_eq!(body["color"], "Dark Red");
    assert_eq!(body["additional_info"]["saturation"], "Saturated");
}

#[actix_web::test]
async fn non_image_upload_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let req = upload(multipart_body("file", "notes.txt", "text/plain", b"hello")).to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "File must be an image");
}

#[actix_web::test]
async fn undecodable_image_is_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let req = upload(multipart_body("file", "broken.jpg", "image/jpeg", b"not really a jpeg")).to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().starts_with("Failed to decode image"));
}

#[actix_web::test]
async fn missing_file_field_is_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let png = png_bytes(&solid(2, 2, [0, 0, 0]));
    let req = upload(multipart_body("photo", "a.png", "image/png", &png)).to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn failing_notifier_does_not_change_the_response() {
    let png = png_bytes(&solid(6, 5, [150, 200, 255]));
    let body = multipart_body("file", "shelf.png", "image/png", &png);

    let quiet = test::init_service(
        App::new()
            .app_data(web::Data::new(state(true).await))
            .configure(configure_routes),
    )
    .await;
    let resp = test::call_service(&quiet, upload(body.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let expected = test::read_body(resp).await;

    let settings = TelegramSettings {
        bot_token: "12345:unused".to_string(),
        chat_id: "-100".to_string(),
        // nothing listens on the discard port
        api_base: "http://127.0.0.1:9/".to_string(),
        locale: Locale::Ru,
        debug: true,
    };
    let mut notifying = state(true).await;
    notifying.notifier = Some(Arc::new(TelegramNotifier::new(&settings).unwrap()));
    notifying.send_by_default = true;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(notifying))
            .configure(configure_routes),
    )
    .await;

    for _ in 0..2 {
        let resp = test::call_service(&app, upload(body.clone()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, expected);
    }
}
