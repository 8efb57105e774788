//! End-to-end scenarios from §8, driven against a real bound server with `reqwest`
//! (§10.6 test tooling).

use serde_json::Value;
use upload_server::app_state::AppState;
use upload_server::config::Config;

struct TestServer {
    base_url: String,
    _storage: tempfile::TempDir,
}

async fn spawn_server() -> TestServer {
    let storage = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.base_dir = storage.path().to_path_buf();
    config.server.port = 0;

    let state = AppState::new(config);
    let router = upload_server::api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        _storage: storage,
    }
}

async fn post_chunk(base_url: &str, session_id: &str, index: u64, total: u64, file_name: &str, bytes: &[u8]) -> reqwest::Response {
    let form = reqwest::multipart::Form::new()
        .text("sessionId", session_id.to_string())
        .text("chunkIndex", index.to_string())
        .text("totalChunks", total.to_string())
        .text("fileName", file_name.to_string())
        .part("file", reqwest::multipart::Part::bytes(bytes.to_vec()));

    reqwest::Client::new()
        .post(format!("{base_url}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn s1_happy_path_three_chunks_in_order() {
    let server = spawn_server().await;
    let id = "s1-session";

    for (i, part) in [b"Hello " as &[u8], b"World ", b"!"].iter().enumerate() {
        let resp = post_chunk(&server.base_url, id, i as u64, 3, "hello.txt", part).await;
        assert_eq!(resp.status(), 200);
    }

    let resp = reqwest::Client::new()
        .post(format!("{}/upload/{id}/complete", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let missing = reqwest::Client::new()
        .get(format!("{}/upload/{id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404, "session should be gone after finalize");
}

#[tokio::test]
async fn s2_out_of_order_submission_assembles_identically() {
    let server = spawn_server().await;
    let id = "s2-session";

    for (i, part) in [(2usize, b"!" as &[u8]), (0, b"Hello "), (1, b"World ")] {
        let resp = post_chunk(&server.base_url, id, i as u64, 3, "hello.txt", part).await;
        assert_eq!(resp.status(), 200);
    }

    let resp = reqwest::Client::new()
        .post(format!("{}/upload/{id}/complete", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn s3_interruption_and_resume_reports_missing_chunks() {
    let server = spawn_server().await;
    let id = "s3-session";

    for i in 0..5u64 {
        let resp = post_chunk(&server.base_url, id, i, 10, "big.bin", b"x").await;
        assert_eq!(resp.status(), 200);
    }

    let resume = reqwest::Client::new()
        .post(format!("{}/upload/{id}/resume", server.base_url))
        .query(&[("totalChunks", "10")])
        .send()
        .await
        .unwrap();
    assert_eq!(resume.status(), 200);
    let record: Value = resume.json().await.unwrap();
    assert_eq!(record["receivedChunks"], serde_json::json!([0, 1, 2, 3, 4]));
    assert_eq!(record["missingChunks"], serde_json::json!([5, 6, 7, 8, 9]));
    assert_eq!(record["nextExpectedChunk"], 5);
    assert_eq!(record["canResume"], true);

    for i in 5..10u64 {
        let resp = post_chunk(&server.base_url, id, i, 10, "big.bin", b"x").await;
        assert_eq!(resp.status(), 200);
    }

    let resp = reqwest::Client::new()
        .post(format!("{}/upload/{id}/complete", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn s4_partial_duplicate_does_not_double_count() {
    let server = spawn_server().await;
    let id = "s4-session";

    post_chunk(&server.base_url, id, 0, 1, "one.bin", b"only-chunk").await;
    post_chunk(&server.base_url, id, 0, 1, "one.bin", b"only-chunk").await;

    let status = reqwest::Client::new()
        .get(format!("{}/upload/{id}", server.base_url))
        .send()
        .await
        .unwrap();
    let record: Value = status.json().await.unwrap();
    assert_eq!(record["uploadedBytes"], "only-chunk".len());
    assert_eq!(record["receivedChunks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn s5_finalize_before_complete_reports_missing_chunks() {
    let server = spawn_server().await;
    let id = "s5-session";

    for i in [0u64, 2, 3] {
        post_chunk(&server.base_url, id, i, 4, "f.bin", b"x").await;
    }

    let resp = reqwest::Client::new()
        .post(format!("{}/upload/{id}/complete", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errorCode"], "UPLOAD_ERROR");
    assert_eq!(body["details"]["missingChunks"], serde_json::json!([1]));

    let status = reqwest::Client::new()
        .get(format!("{}/upload/{id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), 200, "session remains active");
}

#[tokio::test]
async fn s7_cancel_removes_session_and_temp_files() {
    let server = spawn_server().await;
    let id = "s7-session";

    post_chunk(&server.base_url, id, 0, 2, "f.bin", b"a").await;

    let cancel = reqwest::Client::new()
        .delete(format!("{}/upload/{id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), 200);

    let status = reqwest::Client::new()
        .get(format!("{}/upload/{id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), 404);
}

#[tokio::test]
async fn binary_transport_accepts_a_single_chunk_upload() {
    let server = spawn_server().await;
    let id = "binary-session";

    let resp = reqwest::Client::new()
        .post(format!("{}/upload/binary", server.base_url))
        .header("X-File-Id", id)
        .header("X-Chunk-Number", "0")
        .header("X-Total-Chunks", "1")
        .header("X-File-Name", "solo.bin")
        .body(b"only chunk".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::Client::new()
        .post(format!("{}/upload/{id}/complete", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn rejects_chunk_index_equal_to_total_chunks() {
    let server = spawn_server().await;
    let resp = post_chunk(&server.base_url, "boundary-session", 3, 3, "f.bin", b"x").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn health_reports_active_sessions() {
    let server = spawn_server().await;
    post_chunk(&server.base_url, "health-session", 0, 2, "f.bin", b"a").await;

    let resp = reqwest::Client::new()
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "UP");
    assert_eq!(body["sessions"]["active"], 1);
}
