//! Google Drive API client.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tracing::{debug, info};

use crate::error::{DriveError, Result};

/// Google Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Uploads larger than this use a resumable session.
const MULTIPART_LIMIT: usize = 5 * 1024 * 1024;
/// Resumable chunk size (must be a multiple of 256KB).
const CHUNK_SIZE: usize = 4 * 256 * 1024;

const FILE_FIELDS: &str = "id,name,mimeType,size";

/// Body of a download, streamed as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Google Drive file metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes; Drive encodes it as a string.
    #[serde(default)]
    pub size: Option<String>,
}

impl DriveFile {
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Permission created by sharing a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Base URLs, overridable for testing.
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}

/// Google Drive API client.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    pub fn new(endpoints: DriveEndpoints) -> Result<Self> {
        // Resumable uploads answer 308 without a Location header
        let http = Client::builder()
            .user_agent(concat!("cloud-drive/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http, endpoints })
    }

    /// Uploads a file into the user's Drive root.
    ///
    /// Small files go up in one multipart request; larger ones use a
    /// resumable session sent in chunks.
    pub async fn upload(
        &self,
        access_token: &str,
        name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> Result<DriveFile> {
        let file = if data.len() <= MULTIPART_LIMIT {
            self.upload_multipart(access_token, name, mime_type, data).await?
        } else {
            self.upload_resumable(access_token, name, mime_type, data).await?
        };
        info!("Uploaded {} as Drive file {}", file.name, file.id);
        Ok(file)
    }

    async fn upload_multipart(
        &self,
        access_token: &str,
        name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> Result<DriveFile> {
        let url = format!("{}/files", self.endpoints.upload_base);
        let metadata = serde_json::json!({ "name": name });
        let boundary = format!("cloud-drive-{:016x}", rand::random::<u64>());

        let mut body = Vec::with_capacity(data.len() + 512);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata.to_string().as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
        body.extend_from_slice(&data);
        body.extend_from_slice(format!("\r\n--{}--", boundary).as_bytes());

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await?;

        handle_response(response, name).await
    }

    async fn upload_resumable(
        &self,
        access_token: &str,
        name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> Result<DriveFile> {
        let url = format!("{}/files", self.endpoints.upload_base);
        let total = data.len();

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", total.to_string())
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for(response, name).await);
        }

        let session_uri = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::Decode("no upload session URI in response".to_string()))?;

        let mut offset = 0;
        while offset < total {
            let end = (offset + CHUNK_SIZE).min(total);
            debug!("Uploading bytes {}-{} of {}", offset, end - 1, total);

            let response = self
                .http
                .put(&session_uri)
                .bearer_auth(access_token)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", offset, end - 1, total),
                )
                .body(data.slice(offset..end))
                .send()
                .await?;

            match response.status() {
                StatusCode::PERMANENT_REDIRECT => offset = end,
                status if status.is_success() => return handle_response(response, name).await,
                _ => return Err(error_for(response, name).await),
            }
        }

        Err(DriveError::Decode(
            "resumable upload ended without a file resource".to_string(),
        ))
    }

    /// Gets file metadata by ID.
    pub async fn get_metadata(&self, access_token: &str, file_id: &str) -> Result<DriveFile> {
        validate_file_id(file_id)?;
        let url = format!("{}/files/{}", self.endpoints.api_base, file_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await?;

        handle_response(response, file_id).await
    }

    /// Downloads file content as a stream, together with its metadata.
    pub async fn download(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<(DriveFile, ByteStream)> {
        let file = self.get_metadata(access_token, file_id).await?;
        let url = format!("{}/files/{}", self.endpoints.api_base, file_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for(response, file_id).await);
        }

        debug!("Streaming Drive file {}", file_id);
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(DriveError::from));
        Ok((file, Box::pin(stream)))
    }

    /// Deletes a file permanently.
    pub async fn delete(&self, access_token: &str, file_id: &str) -> Result<()> {
        validate_file_id(file_id)?;
        let url = format!("{}/files/{}", self.endpoints.api_base, file_id);

        let response = self
            .http
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT || response.status().is_success() {
            info!("Deleted Drive file {}", file_id);
            Ok(())
        } else {
            Err(error_for(response, file_id).await)
        }
    }

    /// Grants `email` the given role on a file.
    pub async fn share(
        &self,
        access_token: &str,
        file_id: &str,
        email: &str,
        role: &str,
    ) -> Result<Permission> {
        validate_file_id(file_id)?;
        let url = format!("{}/files/{}/permissions", self.endpoints.api_base, file_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .query(&[("fields", "id")])
            .json(&serde_json::json!({
                "type": "user",
                "role": role,
                "emailAddress": email,
            }))
            .send()
            .await?;

        let permission: Permission = handle_response(response, file_id).await?;
        info!("Shared Drive file {} as {}", file_id, role);
        Ok(permission)
    }
}

/// Drive ids are URL-safe tokens; anything else never reaches the API.
fn validate_file_id(file_id: &str) -> Result<()> {
    let valid = !file_id.is_empty()
        && file_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(DriveError::InvalidFileId(file_id.to_string()))
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: Response,
    subject: &str,
) -> Result<T> {
    if response.status().is_success() {
        response
            .json()
            .await
            .map_err(|e| DriveError::Decode(e.to_string()))
    } else {
        Err(error_for(response, subject).await)
    }
}

async fn error_for(response: Response, subject: &str) -> DriveError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized,
        StatusCode::FORBIDDEN => DriveError::Forbidden(message),
        StatusCode::NOT_FOUND => DriveError::NotFound(subject.to_string()),
        _ => DriveError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_validation() {
        assert!(validate_file_id("1AbC_d-EF").is_ok());
        assert!(validate_file_id("").is_err());
        assert!(validate_file_id("../about").is_err());
        assert!(validate_file_id("id?alt=media").is_err());
    }

    #[test]
    fn test_size_bytes() {
        let file = DriveFile {
            id: "1".into(),
            name: "a.txt".into(),
            mime_type: Some("text/plain".into()),
            size: Some("1024".into()),
        };
        assert_eq!(file.size_bytes(), Some(1024));
    }

    #[test]
    fn test_chunk_size_is_multiple_of_256k() {
        assert_eq!(CHUNK_SIZE % (256 * 1024), 0);
    }
}
