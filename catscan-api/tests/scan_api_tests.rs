//! Scan endpoint integration tests
//!
//! Drives the router in-process: analyze, session creation, background
//! removal, status hooks, result recording, claims and artifact uploads.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use catscan_api::services::recognition_normalizer::{MSG_MANY_FACES, MSG_NOT_A_CAT, MSG_ONE_FACE};
use helpers::{
    chunked_multipart_request, jpeg_bytes, multipart_request, png_bytes, session_body, test_app,
    webp_bytes, RecognizeReply, RemoveBgReply,
};

// ============================================================================
// POST /scan/analyze
// ============================================================================

#[tokio::test]
async fn test_analyze_cat_with_one_face_can_proceed() {
    let app = test_app().await;

    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.png"), Some("image/png"), png_bytes(4096))],
    );
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["can_proceed"], true);
    assert_eq!(body["message"], MSG_ONE_FACE);
    assert_eq!(body["image_url"], "https://store/r-1.jpg");
    assert_eq!(body["faces"]["faces_count"], 1);
    assert_eq!(body["request_id"], "req-fixture");
    assert_eq!(headers.get("x-request-id").unwrap(), "req-fixture");
    assert_eq!(app.gateway.recognize_count(), 1);
}

#[tokio::test]
async fn test_analyze_content_outcomes_are_200() {
    let app = test_app().await;

    // Not a cat
    app.gateway.reply_recognize(RecognizeReply::Body(json!({
        "label": "dog",
        "cat_prob": 0.1,
        "faces": {"faces_count": 1}
    })));
    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("dog.jpg"), Some("image/jpeg"), jpeg_bytes(2048))],
    );
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_proceed"], false);
    assert_eq!(body["message"], MSG_NOT_A_CAT);

    // Two faces
    app.gateway.reply_recognize(RecognizeReply::Body(json!({
        "label": "cat",
        "cat_prob": 0.9,
        "faces": {"faces_count": 2}
    })));
    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("cats.jpg"), Some("image/jpeg"), jpeg_bytes(2048))],
    );
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_proceed"], false);
    assert_eq!(body["message"], MSG_MANY_FACES);
}

#[tokio::test]
async fn test_analyze_rejects_large_webp_as_unsupported() {
    // Given: a 600 KiB WebP, over the size limit and not an allowed type
    let app = test_app().await;
    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.webp"), Some("image/webp"), webp_bytes(600 * 1024))],
    );

    // When: analyzed
    let (status, headers, body) = app.send(request).await;

    // Then: media type wins over size, and recognition is never called
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(headers.get("x-request-id").is_some());
    assert_eq!(app.gateway.recognize_count(), 0);
}

#[tokio::test]
async fn test_streamed_webp_past_body_limit_is_unsupported() {
    // 3 MiB is past the 2 MiB request body cap
    let app = test_app().await;
    let request = chunked_multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.webp"), Some("image/webp"), webp_bytes(3 * 1024 * 1024))],
        64 * 1024,
    );

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(app.gateway.recognize_count(), 0);
}

#[tokio::test]
async fn test_streamed_png_past_body_limit_is_too_large() {
    let app = test_app().await;
    let request = chunked_multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.png"), Some("image/png"), png_bytes(3 * 1024 * 1024))],
        64 * 1024,
    );

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "FILE_TOO_LARGE");
    assert_eq!(body["message"], "The image is too large. Maximum size is 512 KB.");
    assert_eq!(app.gateway.recognize_count(), 0);
}

#[tokio::test]
async fn test_analyze_rejects_oversized_png() {
    let app = test_app().await;
    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.png"), Some("image/png"), png_bytes(600 * 1024))],
    );

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "FILE_TOO_LARGE");
    assert_eq!(app.gateway.recognize_count(), 0);
}

#[tokio::test]
async fn test_analyze_without_file_part() {
    let app = test_app().await;
    let request = multipart_request("/scan/analyze", &[("note", None, None, b"hello".to_vec())]);

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FILE");
}

#[tokio::test]
async fn test_analyze_upstream_unreachable() {
    let app = test_app().await;
    app.gateway.reply_recognize(RecognizeReply::Unreachable);

    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.png"), Some("image/png"), png_bytes(1024))],
    );
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "FLASK_UNREACHABLE");
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_analyze_non_object_upstream_body() {
    let app = test_app().await;
    app.gateway.reply_recognize(RecognizeReply::Body(json!({"faces": "lots"})));

    let request = multipart_request(
        "/scan/analyze",
        &[("file", Some("cat.png"), Some("image/png"), png_bytes(1024))],
    );
    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "INVALID_FLASK_RESPONSE");
}

// ============================================================================
// POST /scan/sessions, GET /scan/sessions/:id
// ============================================================================

#[tokio::test]
async fn test_create_session_and_read_it_back() {
    let app = test_app().await;

    let (status, body) = app.post("/scan/sessions", None, session_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    let session_id = body["data"]["session_id"].as_str().unwrap().to_string();
    let image_id = body["data"]["image_id"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    assert_eq!(view["session"]["status"], "processing");
    assert_eq!(view["session"]["checkup_type"], "quick");
    assert_eq!(view["session"]["owner_id"], serde_json::Value::Null);
    assert_eq!(view["session"]["geolocation"]["place"], "Jakarta");
    assert_eq!(view["images"].as_array().unwrap().len(), 1);
    assert_eq!(view["images"][0]["id"], image_id.as_str());
    assert_eq!(view["images"][0]["slots"]["original"]["id"], "orig-1");
    assert!(view["result"].is_null());
}

#[tokio::test]
async fn test_duplicate_create_yields_distinct_sessions() {
    let app = test_app().await;

    let first = app.create_session(None, session_body()).await;
    let second = app.create_session(None, session_body()).await;

    assert_ne!(first, second);
}

#[tokio::test]
async fn test_create_session_rejects_bad_checkup_type() {
    let app = test_app().await;
    let mut body = session_body();
    body["checkup_type"] = json!("thorough");

    let (status, body) = app.post("/scan/sessions", None, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_session_rejects_half_populated_slot() {
    let app = test_app().await;
    let mut body = session_body();
    body["images"]["preview"] = json!({"id": "prev-1"});

    let (status, body) = app.post("/scan/sessions", None, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_session_treats_null_slots_as_empty() {
    let app = test_app().await;
    let mut body = session_body();
    body["images"]["preview"] = serde_json::Value::Null;

    let (status, created) = app.post("/scan/sessions", None, body).await;
    assert_eq!(status, StatusCode::CREATED);

    let session_id = created["data"]["session_id"].as_str().unwrap();
    let (_, view) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    let slots = &view["data"]["images"][0]["slots"];
    assert_eq!(slots["original"]["id"], "orig-1");
    assert!(slots.get("preview").is_none());

    // A null map is no slots at all
    let mut body = session_body();
    body["images"] = serde_json::Value::Null;
    let (status, _) = app.post("/scan/sessions", None, body).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_session_rejects_result_only_slot() {
    let app = test_app().await;
    let mut body = session_body();
    body["images"]["heatmap"] = json!({"id": "h-1", "url": "https://store/h-1.png"});

    let (status, _) = app.post("/scan/sessions", None, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_session_rejects_malformed_json() {
    let app = test_app().await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/scan/sessions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_session_cat_requires_owner() {
    let app = test_app().await;
    let cat_id = app.register_cat("owner-a", "Mochi").await;

    // Guests cannot reference a cat
    let mut body = session_body();
    body["cat_id"] = json!(cat_id);
    let (status, _) = app.post("/scan/sessions", None, body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nor can a different user
    let (status, body_b) = app.post("/scan/sessions", Some("owner-b"), body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body_b["code"], "VALIDATION_ERROR");

    // The owner can
    let (status, _) = app.post("/scan/sessions", Some("owner-a"), body).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_get_unknown_session_is_404() {
    let app = test_app().await;

    let (status, body) = app
        .get(&format!("/scan/sessions/{}", uuid::Uuid::now_v7()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");

    let (status, body) = app.get("/scan/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

// ============================================================================
// POST /scan/sessions/:id/remove-bg
// ============================================================================

#[tokio::test]
async fn test_remove_bg_fills_slot_from_original() {
    let app = test_app().await;
    let session_id = app.create_session(None, session_body()).await;

    let (status, body) = app
        .post(&format!("/scan/sessions/{}/remove-bg", session_id), None, json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "nobg-1");
    assert_eq!(body["data"]["url"], "https://store/nobg-1.png");
    assert_eq!(body["data"]["cached"], false);
    assert_eq!(
        app.gateway.remove_bg_sources.lock().unwrap().as_slice(),
        ["https://store/orig-1.jpg".to_string()]
    );

    let (_, view) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    let slot = &view["data"]["images"][0]["slots"]["remove_bg"];
    assert_eq!(slot["id"], "nobg-1");
    assert_eq!(slot["url"], "https://store/nobg-1.png");
}

#[tokio::test]
async fn test_remove_bg_falls_back_to_roi() {
    let app = test_app().await;
    let mut body = session_body();
    body["images"] = json!({"roi": {"id": "roi-9", "url": "https://store/roi-9.jpg"}});
    let session_id = app.create_session(None, body).await;

    let (status, _) = app
        .post(&format!("/scan/sessions/{}/remove-bg", session_id), None, json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.gateway.remove_bg_sources.lock().unwrap().as_slice(),
        ["https://store/roi-9.jpg".to_string()]
    );
}

#[tokio::test]
async fn test_remove_bg_error_order() {
    let app = test_app().await;

    // Unknown session
    let (status, body) = app
        .post(&format!("/scan/sessions/{}/remove-bg", uuid::Uuid::now_v7()), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");

    // Image with no usable source
    let mut draft = session_body();
    draft["images"] = json!({"preview": {"id": "p", "url": "https://store/p.jpg"}});
    let session_id = app.create_session(None, draft).await;
    let (status, body) = app
        .post(&format!("/scan/sessions/{}/remove-bg", session_id), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "SOURCE_IMAGE_MISSING");

    // Session whose images were removed
    let session_id = app.create_session(None, session_body()).await;
    sqlx::query("DELETE FROM scan_images WHERE session_id = ?")
        .bind(&session_id)
        .execute(&app.state.db)
        .await
        .unwrap();
    let (status, body) = app
        .post(&format!("/scan/sessions/{}/remove-bg", session_id), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "IMAGE_NOT_FOUND");

    assert!(app.gateway.remove_bg_sources.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_bg_upstream_http_error() {
    let app = test_app().await;
    app.gateway.reply_remove_bg(RemoveBgReply::Http {
        status: 500,
        summary: "model crashed".to_string(),
    });
    let session_id = app.create_session(None, session_body()).await;

    let (status, body) = app
        .post(&format!("/scan/sessions/{}/remove-bg", session_id), None, json!({}))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "REMOVE_BG_HTTP_ERROR");
    assert_eq!(body["upstream_status"], 500);
    assert_eq!(body["upstream_error"], "model crashed");

    // Slot stays empty
    let (_, view) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    assert!(view["data"]["images"][0]["slots"]["remove_bg"].is_null());
}

// ============================================================================
// Status hook and result recording
// ============================================================================

#[tokio::test]
async fn test_status_transitions() {
    let app = test_app().await;
    let session_id = app.create_session(None, session_body()).await;
    let uri = format!("/scan/sessions/{}/status", session_id);

    let (status, body) = app.post(&uri, None, json!({"status": "done"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "done");
    assert_eq!(body["data"]["changed"], true);

    // Same terminal status again is a no-op
    let (status, body) = app.post(&uri, None, json!({"status": "done"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], false);

    // Terminal states never change
    let (status, body) = app.post(&uri, None, json!({"status": "failed"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");

    let (status, body) = app.post(&uri, None, json!({"status": "archived"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_record_result_completes_session() {
    let app = test_app().await;
    let session_id = app.create_session(None, session_body()).await;

    let body = app.record_labels(&session_id, &["Normal", "Abnormal"]).await;
    assert_eq!(body["data"]["status"], "done");
    assert_eq!(body["data"]["detail_ids"].as_array().unwrap().len(), 2);

    let (_, view) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    assert_eq!(view["data"]["session"]["status"], "done");
    assert_eq!(view["data"]["result"]["remarks"], "auto");
    assert_eq!(view["data"]["result"]["details"].as_array().unwrap().len(), 2);

    // One result per session
    let (status, body) = app
        .post(
            &format!("/scan/sessions/{}/result", session_id),
            None,
            json!({"details": []}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "RESULT_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_record_result_on_failed_session_conflicts() {
    let app = test_app().await;
    let session_id = app.create_session(None, session_body()).await;
    app.post(
        &format!("/scan/sessions/{}/status", session_id),
        None,
        json!({"status": "failed"}),
    )
    .await;

    let (status, body) = app
        .post(
            &format!("/scan/sessions/{}/result", session_id),
            None,
            json!({"details": [{"area_name": "eyes", "label": "Normal"}]}),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");
}

#[tokio::test]
async fn test_record_result_rolls_back_when_status_moves_underneath() {
    let app = test_app().await;
    let session_id = app.create_session(None, session_body()).await;
    // Another writer fails the session between the status read and the update
    sqlx::query(
        "CREATE TRIGGER fail_session_on_result BEFORE INSERT ON scan_results \
         BEGIN UPDATE scan_sessions SET status = 'failed' WHERE id = NEW.session_id; END",
    )
    .execute(&app.state.db)
    .await
    .unwrap();

    let (status, body) = app
        .post(
            &format!("/scan/sessions/{}/result", session_id),
            None,
            json!({"details": [{"area_name": "eyes", "label": "Normal"}]}),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");
    let (_, view) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    assert!(view["data"]["result"].is_null());
    assert_eq!(view["data"]["session"]["status"], "processing");
}

#[tokio::test]
async fn test_record_result_validates_details() {
    let app = test_app().await;
    let session_id = app.create_session(None, session_body()).await;
    let uri = format!("/scan/sessions/{}/result", session_id);

    let (status, _) = app
        .post(&uri, None, json!({"details": [{"area_name": "eyes", "label": "Normal", "confidence_score": 1.5}]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(&uri, None, json!({"details": [{"area_name": "", "label": "Normal"}]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was written
    let (_, view) = app.get(&format!("/scan/sessions/{}", session_id), None).await;
    assert!(view["data"]["result"].is_null());
    assert_eq!(view["data"]["session"]["status"], "processing");
}

// ============================================================================
// Claims and artifacts
// ============================================================================

#[tokio::test]
async fn test_claim_guest_sessions() {
    let app = test_app().await;
    let guest_session = app.create_session(None, session_body()).await;
    let owned_session = app.create_session(Some("someone"), session_body()).await;

    let (status, body) = app
        .post("/scan/sessions/claim", None, json!({"session_ids": [guest_session]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "USER_REQUIRED");

    let (status, body) = app
        .post(
            "/scan/sessions/claim",
            Some("me"),
            json!({"session_ids": [guest_session, owned_session]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["claimed"], 1);

    let (_, view) = app.get(&format!("/scan/sessions/{}", guest_session), None).await;
    assert_eq!(view["data"]["session"]["owner_id"], "me");
}

#[tokio::test]
async fn test_upload_and_discard_artifacts() {
    let app = test_app().await;

    let request = multipart_request(
        "/scan/artifacts",
        &[
            ("bucket", None, None, b"avatars".to_vec()),
            ("file", Some("cat.png"), Some("image/png"), png_bytes(1024)),
        ],
    );
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["bucket"], "avatars");
    assert_eq!(body["data"]["id"], "art-1");

    // Default bucket when none is given
    let request = multipart_request(
        "/scan/artifacts",
        &[("file", Some("cat.jpg"), Some("image/jpeg"), jpeg_bytes(1024))],
    );
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    {
        let uploads = app.store.uploads.lock().unwrap();
        assert_eq!(uploads[0].0, "avatars");
        assert_eq!(uploads[1].0, "scans");
    }

    let (status, body) = app
        .post("/scan/artifacts/discard", None, json!({"ids": ["a", " a ", "b", ""]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["requested"], 2);
    assert_eq!(app.store.deleted.lock().unwrap().as_slice(), ["a".to_string(), "b".to_string()]);

    let (status, _) = app.post("/scan/artifacts/discard", None, json!({"ids": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_artifact_validates_file() {
    let app = test_app().await;
    let request = multipart_request(
        "/scan/artifacts",
        &[("file", Some("cat.webp"), Some("image/webp"), webp_bytes(1024))],
    );

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(app.store.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_reports_ok() {
    let app = test_app().await;

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "catscan-api");
    assert!(body["db_latency_ms"].is_u64());
}
