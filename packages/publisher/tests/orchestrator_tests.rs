//! Integration tests for the publishing workflow.
//!
//! Each test scripts the platform through `MockNoteApi` and runs the whole
//! orchestrator: login, inline images, article, draft-save, reconcile,
//! cover image and publish.

use note_client::{ApiResponse, DownloadedImage, NoteError};
use note_publisher::testing::{Endpoint, MockCall, MockNoteApi, StubAuthenticator};
use note_publisher::{
    Credentials, Document, DocumentOverrides, PublishError, PublishOptions, PublishState,
    Publisher,
};
use serde_json::{json, Value};
use std::time::Duration;

fn credentials() -> Credentials {
    Credentials::new("writer@example.com", "secret")
}

fn document(markdown: &str) -> Document {
    Document::from_markdown(markdown, &DocumentOverrides::default()).unwrap()
}

fn created(id: u64, key: &str) -> ApiResponse {
    ApiResponse::json(201, json!({"data": {"id": id, "key": key}}))
}

fn ok() -> ApiResponse {
    ApiResponse::json(200, json!({"data": {}}))
}

/// Options without reconciliation or retry delays.
fn quiet_options() -> PublishOptions {
    let mut options = PublishOptions::default();
    options.verify_version = false;
    options.cover_policy.backoff = Duration::ZERO;
    options
}

fn publisher(api: MockNoteApi) -> Publisher<MockNoteApi, StubAuthenticator> {
    Publisher::new(api, StubAuthenticator::logged_in()).with_options(quiet_options())
}

fn draft_payloads(api: &MockNoteApi) -> Vec<Value> {
    api.calls_to(Endpoint::DraftSave)
        .into_iter()
        .filter_map(|c| match c {
            MockCall::DraftSave { payload, .. } => Some(payload),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_new_article_saved_as_draft() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(101, "nabc123"))
        .with_response(Endpoint::DraftSave, ok());
    let publisher = publisher(api);

    let doc = document("---\ntitle: Morning coffee\n---\n# Morning coffee\n\nA **small** change.");
    let report = publisher.run(&doc, &credentials()).await;

    let article = report.outcome.as_ref().unwrap();
    assert_eq!(article.id, "101");
    assert_eq!(article.key, "nabc123");
    assert!(article.created_new);
    assert!(!article.published);
    assert_eq!(article.url, "https://note.com/notes/nabc123");
    assert_eq!(
        report.final_state,
        PublishState::Drafted {
            id: "101".to_string(),
            key: "nabc123".to_string()
        }
    );

    let api = publisher.api();
    let create = api.calls_to(Endpoint::CreateTextNote);
    match &create[0] {
        MockCall::CreateTextNote { payload } => {
            assert_eq!(payload["name"], "Morning coffee");
            assert!(payload["body"]
                .as_str()
                .unwrap()
                .contains("<strong>small</strong>"));
        }
        other => panic!("unexpected call {:?}", other),
    }

    let payloads = draft_payloads(api);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["raw_body"], "# Morning coffee\n\nA **small** change.");
    assert_eq!(payloads[0]["body_length"], 26);
    assert_eq!(api.call_count(Endpoint::UpdateTextNote), 0);
}

#[tokio::test]
async fn test_draft_save_stops_at_first_accepted_variant() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(7, "nkey"))
        .with_response(Endpoint::DraftSave, ApiResponse::new(400, "bad payload"))
        .with_response(Endpoint::DraftSave, ApiResponse::new(422, "unprocessable"))
        .with_response(Endpoint::DraftSave, ok())
        .with_default(Endpoint::DraftSave, ok());
    let publisher = publisher(api);

    let report = publisher.run(&document("# T\n\nbody"), &credentials()).await;
    assert!(report.is_success());

    let payloads = draft_payloads(publisher.api());
    assert_eq!(payloads.len(), 3);
    assert!(payloads[0].get("raw_body").is_some());
    assert!(payloads[1].get("raw_body").is_none());
    assert_eq!(payloads[2]["body"], "# T\n\nbody");
}

#[tokio::test]
async fn test_embedded_error_is_not_acceptance() {
    let embedded = ApiResponse::json(
        200,
        json!({"error": {"code": "forbidden", "message": "not your draft"}}),
    );
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(7, "nkey"))
        .with_default(Endpoint::DraftSave, embedded);
    let publisher = publisher(api);

    let report = publisher.run(&document("# T\n\nbody"), &credentials()).await;

    match report.outcome {
        Err(PublishError::UpstreamRejected { step, status, body }) => {
            assert_eq!(step, "draft_save");
            assert_eq!(status, 200);
            assert!(body.contains("not your draft"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(publisher.api().call_count(Endpoint::DraftSave), 5);
    assert_eq!(report.final_state, PublishState::Failed);
}

#[tokio::test]
async fn test_empty_session_is_auth_failure() {
    let api = MockNoteApi::new();
    let publisher =
        Publisher::new(api, StubAuthenticator::empty()).with_options(quiet_options());

    let report = publisher.run(&document("# T"), &credentials()).await;

    assert!(matches!(report.outcome, Err(PublishError::AuthFailure { .. })));
    assert!(publisher.api().calls().is_empty());
    assert_eq!(report.final_state, PublishState::Failed);
}

#[tokio::test]
async fn test_login_error_is_auth_failure() {
    let publisher = Publisher::new(MockNoteApi::new(), StubAuthenticator::failing("timeout"))
        .with_options(quiet_options());

    let report = publisher.run(&document("# T"), &credentials()).await;
    match report.outcome {
        Err(PublishError::AuthFailure { reason }) => assert_eq!(reason, "timeout"),
        other => panic!("expected auth failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_existing_article_is_not_found() {
    let api = MockNoteApi::new().with_response(Endpoint::GetTextNote, ApiResponse::new(404, "{}"));
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\nnote_id: 555\n---\nbody");
    let report = publisher.run(&doc, &credentials()).await;

    match report.outcome {
        Err(PublishError::NotFound { id }) => assert_eq!(id, "555"),
        other => panic!("expected not found, got {:?}", other),
    }
    assert_eq!(publisher.api().call_count(Endpoint::CreateTextNote), 0);
    assert_eq!(publisher.api().call_count(Endpoint::DraftSave), 0);
}

#[tokio::test]
async fn test_method_not_allowed_proceeds_with_id_as_key() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::GetTextNote, ApiResponse::new(405, ""))
        .with_default(Endpoint::DraftSave, ApiResponse::new(500, "down"));
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\nnote_id: \"555\"\n---\nbody");
    let report = publisher.run(&doc, &credentials()).await;

    // Proceeds to draft-save, which then fails on its own.
    assert!(matches!(
        report.outcome,
        Err(PublishError::UpstreamRejected { step: "draft_save", status: 500, .. })
    ));
    let payloads = draft_payloads(publisher.api());
    assert_eq!(payloads.len(), 5);
    assert_eq!(payloads[4]["key"], "555");
    assert_eq!(publisher.api().call_count(Endpoint::CreateTextNote), 0);
}

#[tokio::test]
async fn test_existing_article_is_updated() {
    let api = MockNoteApi::new()
        .with_response(
            Endpoint::GetTextNote,
            ApiResponse::json(200, json!({"data": {"id": 555, "key": "nexisting"}})),
        )
        .with_response(Endpoint::DraftSave, ok());
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\nnote_id: 555\n---\nbody");
    let article = publisher.run(&doc, &credentials()).await.outcome.unwrap();

    assert!(!article.created_new);
    assert_eq!(article.key, "nexisting");
    match &publisher.api().calls_to(Endpoint::DraftSave)[0] {
        MockCall::DraftSave { id, .. } => assert_eq!(id, "555"),
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_create_without_key_is_rejected() {
    let api = MockNoteApi::new().with_response(
        Endpoint::CreateTextNote,
        ApiResponse::json(201, json!({"data": {"id": 9}})),
    );
    let publisher = publisher(api);

    let report = publisher.run(&document("# T"), &credentials()).await;
    assert!(matches!(
        report.outcome,
        Err(PublishError::UpstreamRejected { step: "create_article", .. })
    ));
    assert_eq!(report.final_state, PublishState::Failed);
}

#[tokio::test]
async fn test_publish_sends_normalized_hashtags() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(1, "npub"))
        .with_response(Endpoint::DraftSave, ok())
        .with_response(Endpoint::UpdateTextNote, ok());
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\npublished: true\ntags: [coffee, \"#coffee\", \" morning \", \"\"]\n---\nbody");
    let report = publisher.run(&doc, &credentials()).await;

    let article = report.outcome.as_ref().unwrap();
    assert!(article.published);
    assert_eq!(report.final_state, PublishState::Published);

    match &publisher.api().calls_to(Endpoint::UpdateTextNote)[0] {
        MockCall::UpdateTextNote { id, payload } => {
            assert_eq!(id, "1");
            assert_eq!(payload["status"], "published");
            assert_eq!(payload["hashtags"], json!(["#coffee", "#morning"]));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_embedded_error_is_fatal() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(1, "npub"))
        .with_response(Endpoint::DraftSave, ok())
        .with_response(
            Endpoint::UpdateTextNote,
            ApiResponse::json(200, json!({"error": {"message": "hashtag limit"}})),
        );
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\npublished: true\n---\nbody");
    let report = publisher.run(&doc, &credentials()).await;
    assert!(matches!(
        report.outcome,
        Err(PublishError::UpstreamRejected { step: "publish", .. })
    ));
}

#[tokio::test]
async fn test_failed_cover_upload_is_a_warning() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(3, "ncover"))
        .with_response(Endpoint::DraftSave, ok())
        .with_download(
            "https://example.com/cover.jpg",
            Err(NoteError::Network("connection reset".into())),
        );
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\nimage: https://example.com/cover.jpg\n---\nbody");
    let report = publisher.run(&doc, &credentials()).await;

    let article = report.outcome.as_ref().unwrap();
    assert_eq!(article.eyecatch_url, None);
    let warnings: Vec<_> = report.events.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("cover image not set"));
}

#[tokio::test]
async fn test_cover_upload_sets_eyecatch_url() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(3, "ncover"))
        .with_response(Endpoint::DraftSave, ok())
        .with_download(
            "https://example.com/cover.jpg",
            Ok(DownloadedImage {
                bytes: b"jpeg".to_vec(),
                content_type: Some("image/jpeg".to_string()),
            }),
        )
        .with_response(
            Endpoint::Eyecatch,
            ApiResponse::json(200, json!({"data": {"url": "https://assets.example.com/eye.jpg"}})),
        );
    let publisher = publisher(api);

    let doc = document("---\ntitle: T\nimage: https://example.com/cover.jpg\n---\nbody");
    let article = publisher.run(&doc, &credentials()).await.outcome.unwrap();

    assert_eq!(
        article.eyecatch_url.as_deref(),
        Some("https://assets.example.com/eye.jpg")
    );
    match &publisher.api().calls_to(Endpoint::Eyecatch)[0] {
        MockCall::Eyecatch { note_id, file } => {
            assert_eq!(note_id, "3");
            assert_eq!(file.field_name, "file");
            assert_eq!(file.file_name, "blob");
            assert_eq!(file.mime_type, "image/jpeg");
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_reconcile_runs_when_enabled() {
    let api = MockNoteApi::new()
        .with_response(
            Endpoint::CreateTextNote,
            ApiResponse::json(
                201,
                json!({"data": {"id": 5, "key": "nrec", "created_at": "2024-03-01T09:00:00+09:00"}}),
            ),
        )
        .with_response(Endpoint::DraftSave, ok())
        .with_default(Endpoint::VerifyDraftVersion, ApiResponse::new(200, "{}"));

    let mut options = quiet_options();
    options.verify_version = true;
    let publisher = Publisher::new(api, StubAuthenticator::logged_in()).with_options(options);

    let report = publisher.run(&document("# T\n\nbody"), &credentials()).await;
    assert!(report.is_success());

    let verified = publisher.api().calls_to(Endpoint::VerifyDraftVersion);
    assert_eq!(
        verified[0],
        MockCall::VerifyDraftVersion {
            note_ref: "nrec".to_string(),
            last_updated_at: "2024-03-01T09:00:00+09:00".to_string(),
        }
    );
}

#[tokio::test]
async fn test_reconcile_failures_never_fail_the_run() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(5, "nrec"))
        .with_response(Endpoint::DraftSave, ok())
        .with_failure(Endpoint::GetTextNote, NoteError::Network("timeout".into()));

    let mut options = quiet_options();
    options.verify_version = true;
    let publisher = Publisher::new(api, StubAuthenticator::logged_in()).with_options(options);

    let report = publisher.run(&document("# T\n\nbody"), &credentials()).await;
    assert!(report.is_success());
    assert_eq!(report.events.warnings().count(), 0);
}

#[tokio::test]
async fn test_network_failure_on_draft_save_is_terminal() {
    let api = MockNoteApi::new()
        .with_response(Endpoint::CreateTextNote, created(301, "nnet"))
        .with_failure(
            Endpoint::DraftSave,
            NoteError::Network("request timed out".into()),
        )
        .with_default(Endpoint::DraftSave, ok());
    let publisher = publisher(api);

    let report = publisher.run(&document("# Title\n\nbody"), &credentials()).await;

    assert!(matches!(
        report.outcome,
        Err(PublishError::Network { step: "draft_save", .. })
    ));
    assert_eq!(report.final_state, PublishState::Failed);
    assert_eq!(publisher.api().call_count(Endpoint::DraftSave), 1);
    assert!(report
        .events
        .events()
        .iter()
        .any(|e| e.level == note_publisher::EventLevel::Error
            && e.step == note_publisher::Step::DraftSave));
}

#[tokio::test]
async fn test_network_failure_on_create_is_terminal() {
    let api = MockNoteApi::new()
        .with_failure(
            Endpoint::CreateTextNote,
            NoteError::Network("connection refused".into()),
        )
        .with_default(Endpoint::DraftSave, ok());
    let publisher = publisher(api);

    let report = publisher.run(&document("# Title\n\nbody"), &credentials()).await;

    match &report.outcome {
        Err(PublishError::Network { step, message }) => {
            assert_eq!(*step, "create_article");
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(report.final_state, PublishState::Failed);
    assert_eq!(publisher.api().call_count(Endpoint::CreateTextNote), 1);
    assert_eq!(publisher.api().call_count(Endpoint::DraftSave), 0);
}
