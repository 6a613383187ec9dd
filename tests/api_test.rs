mod helpers;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};

use doc_processor::api::{health::health_config, job::JobService, job::job_config, validation};
use doc_processor::db::JobStore;
use doc_processor::engine::{Job, JobId};
use helpers::{ScriptedClient, TestEngine};

const CHUNK_SIZE: usize = 5;

macro_rules! init_app {
    ($t:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($t.engine.clone()))
                .app_data(web::Data::new(JobService::new($t.engine.clone(), CHUNK_SIZE)))
                .app_data(validation::json_config())
                .app_data(validation::multipart_config(1024 * 1024))
                .configure(health_config)
                .configure(job_config),
        )
        .await
    };
}

#[actix_web::test]
async fn given_valid_json_job_when_posted_then_job_is_accepted_with_segment_count() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let app = init_app!(t);

    let req = test::TestRequest::post()
        .uri("/api/jobs")
        .set_json(json!({"name": "notes.txt", "instruction": "Uppercase.", "text": "hello world"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_segments"], 3);

    let id: JobId = body["job_id"].as_str().unwrap().parse().unwrap();
    t.engine.wait_idle().await;
    let job = t.load(id).await;
    assert_eq!(job.name, "notes.txt");
    assert_eq!(job.results, vec!["HELLO", " WORL", "D"]);
}

#[actix_web::test]
async fn given_empty_name_when_posted_then_validation_error_is_returned() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let app = init_app!(t);

    let req = test::TestRequest::post()
        .uri("/api/jobs")
        .set_json(json!({"name": "", "instruction": "Uppercase.", "text": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["fields"]["name"]["errors"].is_array());
    assert!(t.store.list_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn given_multipart_document_when_uploaded_then_job_is_created_from_file() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let app = init_app!(t);

    let body = "--XBOUNDARYX\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"doc.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        abcdefghij\r\n\
        --XBOUNDARYX\r\n\
        Content-Disposition: form-data; name=\"prompt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        Uppercase everything.\r\n\
        --XBOUNDARYX--\r\n";
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header(("content-type", "multipart/form-data; boundary=XBOUNDARYX"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_segments"], 2);

    let id: JobId = body["job_id"].as_str().unwrap().parse().unwrap();
    t.engine.wait_idle().await;
    let job = t.load(id).await;
    assert_eq!(job.name, "doc.txt");
    assert_eq!(job.instruction, "Uppercase everything.");
    assert_eq!(job.results, vec!["ABCDE", "FGHIJ"]);
}

#[actix_web::test]
async fn given_unknown_or_malformed_id_when_fetched_then_not_found_or_bad_request() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let app = init_app!(t);

    let missing = test::TestRequest::get()
        .uri(&format!("/api/jobs/{}", JobId::new()))
        .to_request();
    assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::NOT_FOUND);

    let malformed = test::TestRequest::get().uri("/api/jobs/not-a-uuid").to_request();
    assert_eq!(test::call_service(&app, malformed).await.status(), StatusCode::BAD_REQUEST);

    let resume_missing = test::TestRequest::post()
        .uri(&format!("/api/jobs/{}/resume", JobId::new()))
        .to_request();
    assert_eq!(
        test::call_service(&app, resume_missing).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn given_failed_job_when_resumed_over_http_then_failed_segments_are_reset() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let mut job = Job::new("doc.txt", "Uppercase.", vec!["ab".into(), "cd".into()]);
    job.segments[0].mark_completed("AB".into(), 1);
    job.segments[1].mark_failed("boom".into(), 3);
    job.mark_failed();
    t.store.put(&job).await.unwrap();
    let app = init_app!(t);

    let req = test::TestRequest::post()
        .uri(&format!("/api/jobs/{}/resume", job.id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "resumed");
    assert_eq!(body["reset_segments"], 1);

    t.engine.wait_idle().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/jobs/{}/resume", job.id))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["outcome"], "already_completed");

    let req = test::TestRequest::get().uri(&format!("/api/jobs/{}", job.id)).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100);
    assert_eq!(body["results"], json!(["AB", "CD"]));
    assert_eq!(t.client.calls_for("ab"), 0);
}

#[actix_web::test]
async fn given_stored_jobs_when_listed_then_summaries_are_oldest_first() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let first = t.seed(&["a"]).await;
    let mut second = t.seed(&["b", "c"]).await;
    second.created_at = first.created_at + chrono::Duration::seconds(1);
    t.store.put(&second).await.unwrap();
    let app = init_app!(t);

    let req = test::TestRequest::get().uri("/api/jobs").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], first.id.to_string());
    assert_eq!(rows[1]["id"], second.id.to_string());
    assert_eq!(rows[1]["total_segments"], 2);
    assert_eq!(rows[1]["status"], "pending");
}

#[actix_web::test]
async fn given_in_memory_store_when_probed_then_health_endpoints_report_ok() {
    let t = TestEngine::new(2, ScriptedClient::new());
    let app = init_app!(t);

    for uri in ["/health", "/ready", "/live"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
    }

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["running_jobs"], 0);
}
