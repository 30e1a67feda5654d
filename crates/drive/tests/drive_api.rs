//! Drive client against a mock Drive API

use bytes::Bytes;
use drive::{DriveClient, DriveEndpoints, DriveError};
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DriveClient {
    DriveClient::new(DriveEndpoints {
        api_base: format!("{}/drive/v3", server.uri()),
        upload_base: format!("{}/upload/drive/v3", server.uri()),
    })
    .unwrap()
}

#[tokio::test]
async fn small_upload_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header("authorization", "Bearer token"))
        .and(body_string_contains(r#"{"name":"notes.txt"}"#))
        .and(body_string_contains("hello drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-1",
            "name": "notes.txt",
            "mimeType": "text/plain"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = client(&server)
        .upload("token", "notes.txt", "text/plain", Bytes::from_static(b"hello drive"))
        .await
        .unwrap();

    assert_eq!(file.id, "file-1");
    assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn large_upload_is_resumable() {
    let server = MockServer::start().await;
    let session_uri = format!("{}/upload-session/abc", server.uri());
    let total = 6 * 1024 * 1024;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("x-upload-content-length", total.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session_uri.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .and(header("content-range", format!("bytes 5242880-6291455/{}", total).as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "big-1",
            "name": "big.bin"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .respond_with(ResponseTemplate::new(308))
        .expect(5)
        .mount(&server)
        .await;

    let file = client(&server)
        .upload("token", "big.bin", "application/octet-stream", Bytes::from(vec![7u8; total]))
        .await
        .unwrap();

    assert_eq!(file.id, "big-1");
}

#[tokio::test]
async fn download_streams_content_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file body".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-1",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "size": "9"
        })))
        .mount(&server)
        .await;

    let (file, mut stream) = client(&server).download("token", "file-1").await.unwrap();
    assert_eq!(file.name, "report.pdf");
    assert_eq!(file.size_bytes(), Some(9));

    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(content, b"file body");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "File not found: gone."}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .download("token", "gone")
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, DriveError::NotFound(id) if id == "gone"));
}

#[tokio::test]
async fn expired_token_requires_reauthorization() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/file-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).delete("expired", "file-1").await.unwrap_err();
    assert!(err.requires_reauthorization());
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/file-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete("token", "file-1").await.unwrap();
}

#[tokio::test]
async fn share_creates_user_permission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file-1/permissions"))
        .and(body_partial_json(json!({
            "type": "user",
            "role": "writer",
            "emailAddress": "friend@example.com"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "perm-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let permission = client(&server)
        .share("token", "file-1", "friend@example.com", "writer")
        .await
        .unwrap();
    assert_eq!(permission.id, "perm-1");
}

#[tokio::test]
async fn forbidden_share_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file-1/permissions"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "The user does not have sufficient permissions for this file."}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .share("token", "file-1", "friend@example.com", "writer")
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Forbidden(m) if m.contains("sufficient permissions")));
}

#[tokio::test]
async fn invalid_file_id_never_reaches_api() {
    let server = MockServer::start().await;
    let err = client(&server).delete("token", "../files").await.unwrap_err();
    assert!(matches!(err, DriveError::InvalidFileId(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
