//! End-to-end agent calls against a mock Gemini endpoint.

use base64::Engine;
use genreel::{
    AgentConfig, AspectRatio, GenReelError, MediaKind, VideoAgent, VideoRequest, VideoSource,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";
const OPERATION: &str = "models/veo-test/operations/op-1";

fn b64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn agent(server: &MockServer) -> VideoAgent {
    agent_with_timeout(server, Duration::from_secs(5))
}

fn agent_with_timeout(server: &MockServer, timeout: Duration) -> VideoAgent {
    let config = AgentConfig::builder()
        .credential(KEY)
        .video_model("veo-test")
        .base_url(format!("{}/v1beta", server.uri()))
        .poll_interval(Duration::from_millis(10))
        .timeout(timeout)
        .build()
        .unwrap();
    VideoAgent::new(config)
}

async fn request_bodies(server: &MockServer, path_suffix: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().ends_with(path_suffix))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

fn video_uri(server: &MockServer) -> String {
    format!("{}/v1beta/files/vid-1:download?alt=media", server.uri())
}

fn finished_operation(uri: &str) -> Value {
    json!({
        "name": OPERATION,
        "done": true,
        "response": {
            "generateVideoResponse": {
                "generatedSamples": [{"video": {"uri": uri}}]
            }
        }
    })
}

async fn mount_download(server: &MockServer, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path("/v1beta/files/vid-1:download"))
        .and(query_param("key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn generate_text_joins_parts_and_sends_system_instruction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Tide pools "}, {"text": "at dawn."}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = agent(&server)
        .generate_text("Write a title", Some("You are terse."))
        .await
        .unwrap();

    assert_eq!(text, "Tide pools at dawn.");
    let bodies = request_bodies(&server, ":generateContent").await;
    assert_eq!(bodies[0]["contents"][0]["parts"][0]["text"], "Write a title");
    assert_eq!(bodies[0]["systemInstruction"]["parts"][0]["text"], "You are terse.");
}

#[tokio::test]
async fn generate_image_decodes_inline_data() {
    let server = MockServer::start().await;
    let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-2.0-flash-exp-image-generation:generateContent",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is your image"},
                    {"inlineData": {"mimeType": "image/png", "data": b64(&png)}}
                ]}
            }]
        })))
        .mount(&server)
        .await;

    let artifact = agent(&server)
        .generate_image("A lighthouse", AspectRatio::Portrait)
        .await
        .unwrap();

    assert_eq!(artifact.kind, MediaKind::Image);
    assert_eq!(artifact.mime_type, "image/png");
    assert_eq!(artifact.bytes().unwrap(), png);
    let bodies = request_bodies(&server, ":generateContent").await;
    assert_eq!(bodies[0]["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
}

#[tokio::test]
async fn generate_audio_writes_wav() {
    let server = MockServer::start().await;
    let samples: [i16; 4] = [0, 512, -512, 1024];
    let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{
                    "inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": b64(&pcm)}
                }]}
            }]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("narration.wav");
    let artifact = agent(&server)
        .generate_audio("Hello", None, &output)
        .await
        .unwrap();

    assert_eq!(artifact.path(), Some(output.as_path()));
    assert_eq!(artifact.mime_type, "audio/wav");
    let mut reader = hound::WavReader::open(&output).unwrap();
    assert_eq!(reader.spec().sample_rate, 24_000);
    let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read, samples);

    let bodies = request_bodies(&server, ":generateContent").await;
    assert_eq!(
        bodies[0]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
            ["voiceName"],
        "Puck"
    );
}

#[tokio::test]
async fn generate_video_polls_until_done_then_downloads() {
    let server = MockServer::start().await;
    let uri = video_uri(&server);

    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-test:predictLongRunning"))
        .and(header("x-goog-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/{OPERATION}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION, "done": false})),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/{OPERATION}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished_operation(&uri)))
        .mount(&server)
        .await;
    mount_download(&server, b"mp4-bytes").await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let artifact = agent(&server)
        .generate_video(&VideoRequest::new("Waves at night"), &output)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"mp4-bytes");
    assert_eq!(artifact.kind, MediaKind::Video);
    assert_eq!(artifact.remote_uri(), Some(uri.as_str()));

    let requests = server.received_requests().await.unwrap();
    let polls = requests
        .iter()
        .filter(|r| r.url.path() == format!("/v1beta/{OPERATION}"))
        .count();
    assert_eq!(polls, 3);

    let bodies = request_bodies(&server, ":predictLongRunning").await;
    assert_eq!(bodies[0]["instances"][0]["prompt"], "Waves at night");
    assert_eq!(bodies[0]["parameters"]["aspectRatio"], "16:9");
    assert_eq!(bodies[0]["parameters"]["durationSeconds"], 8);
}

#[tokio::test]
async fn extend_video_sends_source_and_skips_polling_when_already_done() {
    let server = MockServer::start().await;
    let uri = video_uri(&server);

    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-test:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished_operation(&uri)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/{OPERATION}")))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_download(&server, b"extended").await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("extended.mp4");
    agent(&server)
        .extend_video(
            VideoSource::from_uri("https://example.com/files/original"),
            "The camera keeps rolling",
            &output,
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"extended");
    let bodies = request_bodies(&server, ":predictLongRunning").await;
    let body = &bodies[0];
    assert_eq!(body["instances"][0]["video"]["uri"], "https://example.com/files/original");
    assert_eq!(body["parameters"]["resolution"], "720p");
    assert_eq!(body["parameters"]["durationSeconds"], 8);
    assert_eq!(body["parameters"]["numberOfVideos"], 1);
}

#[tokio::test]
async fn failed_operation_surfaces_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-test:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/{OPERATION}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": OPERATION,
            "done": true,
            "error": {"code": 3, "message": "Invalid prompt"}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = agent(&server)
        .generate_video(&VideoRequest::new("Anything"), dir.path().join("x.mp4"))
        .await
        .unwrap_err();

    match err {
        GenReelError::VideoGeneration(msg) => assert_eq!(msg, "Invalid prompt"),
        other => panic!("expected VideoGeneration, got {other:?}"),
    }
    assert!(!dir.path().join("x.mp4").exists());
}

#[tokio::test]
async fn malformed_submit_response_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-test:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = agent(&server)
        .generate_video(&VideoRequest::new("Anything"), dir.path().join("x.mp4"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenReelError::Json(_)), "got {err:?}");
    assert!(!err.is_retryable());
    assert_eq!(err.retry_after(), None);
}

#[tokio::test]
async fn stuck_operation_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-test:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/{OPERATION}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION, "done": false})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = agent_with_timeout(&server, Duration::from_millis(50))
        .generate_video(&VideoRequest::new("Forever"), dir.path().join("x.mp4"))
        .await
        .unwrap_err();

    match err {
        GenReelError::Timeout { operation, .. } => assert_eq!(operation, OPERATION),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid.", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = agent(&server).generate_text("Hi", None).await.unwrap_err();

    match err {
        GenReelError::Auth(msg) => assert_eq!(msg, "API key not valid."),
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = agent(&server).generate_text("Hi", None).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[test]
fn blank_credential_fails_at_construction() {
    let err = AgentConfig::builder().credential("   ").build().unwrap_err();
    assert!(matches!(err, GenReelError::Auth(_)));
}
