//! HTTP client for the share server.

use crate::{
    models::{
        api::{FilesResponse, UploadResponse},
        file::{FileMetadata, FilePayload},
    },
    sync::{error::SyncError, source::FileSource},
};
use reqwest::{
    Client, StatusCode, Url,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, SyncError> {
        if remote.cannot_be_a_base() {
            return Err(SyncError::InvalidBase(remote.to_string()));
        }
        let client = Client::builder().build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// Upload local files as `session_id`.
    ///
    /// Files are streamed in one multipart request; the server stores each
    /// one as it arrives.
    pub async fn upload<P: AsRef<Path>>(
        &self,
        session_id: &str,
        paths: &[P],
    ) -> Result<UploadResponse, SyncError> {
        let mut form = Form::new().text("sessionId", session_id.to_string());
        for path in paths {
            let path = path.as_ref();
            let bytes = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.bin".into());
            let mime_type = mime_guess::from_path(path)
                .first_raw()
                .unwrap_or(DEFAULT_MIME_TYPE);
            debug!(file = %path.display(), size = bytes.len(), mime_type, "adding file to upload");

            let part = Part::bytes(bytes).file_name(name).mime_str(mime_type)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.endpoint(&["files"])?)
            .multipart(form)
            .send()
            .await?;
        Self::parse(response, "files").await
    }

    /// Remove every shared file and the uploader session.
    pub async fn clear(&self) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(self.endpoint(&["files"])?)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SyncError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.remote.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidBase(self.remote.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, SyncError> {
        let response = self.client.get(url).send().await?;
        Self::parse(response, what).await
    }

    async fn parse<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, SyncError> {
        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(SyncError::NotFound(what.to_string())),
            status => Err(SyncError::HttpStatus(status, response.text().await?)),
        }
    }
}

impl FileSource for ApiClient {
    async fn check_session(&self, session_id: &str) -> Result<FilesResponse, SyncError> {
        let mut url = self.endpoint(&["files"])?;
        url.query_pairs_mut()
            .append_pair("sessionId", session_id)
            .append_pair("initial", "true");
        self.get_json(url, "files").await
    }

    async fn list_files(&self) -> Result<Vec<FileMetadata>, SyncError> {
        let response: FilesResponse = self.get_json(self.endpoint(&["files"])?, "files").await?;
        Ok(response.into_files())
    }

    async fn fetch_file(&self, id: &str) -> Result<FilePayload, SyncError> {
        self.get_json(self.endpoint(&["files", id])?, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_append_to_base_path() {
        let client = ApiClient::new(&Url::parse("http://localhost:3000/share/").unwrap()).unwrap();
        assert_eq!(
            client.endpoint(&["files", "a b"]).unwrap().as_str(),
            "http://localhost:3000/share/files/a%20b"
        );

        let client = ApiClient::new(&Url::parse("http://localhost:3000").unwrap()).unwrap();
        assert_eq!(
            client.endpoint(&["files"]).unwrap().as_str(),
            "http://localhost:3000/files"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            ApiClient::new(&url),
            Err(SyncError::InvalidBase(_))
        ));
    }
}
