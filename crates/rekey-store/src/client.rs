//! HTTP document store client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{Document, DocumentStore, DocumentUpdate, StoreError};

/// Page size used when scanning collections.
const SCAN_PAGE_SIZE: u32 = 100;

/// Client for the store's JSON REST surface.
pub struct HttpStore {
    http: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListDocumentsResponse {
    documents: Vec<Document>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    applied: usize,
}

impl HttpStore {
    /// Create a client for the given store URL, optionally with a static
    /// bearer token.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    /// The store URL this client targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(url))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(url))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, StoreError> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(StoreError::Http);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(StoreError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(message)),
            StatusCode::BAD_REQUEST => Err(StoreError::InvalidRequest(message)),
            _ => Err(StoreError::Server {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn list_page(
        &self,
        collection: &str,
        cursor: Option<&str>,
    ) -> Result<ListDocumentsResponse, StoreError> {
        let url = format!("{}/v1/collections/{}/documents", self.base_url, collection);

        let mut query_params: Vec<(&str, String)> =
            vec![("limit", SCAN_PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            query_params.push(("cursor", cursor.to_string()));
        }

        let response = self.get(&url).query(&query_params).send().await?;
        self.handle_response(response).await
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    /// Scan a whole collection, following the cursor across pages.
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut all_documents = Vec::new();
        let mut cursor = None;

        loop {
            let page = self.list_page(collection, cursor.as_deref()).await?;
            all_documents.extend(page.documents);

            if page.cursor.is_none() {
                break;
            }
            cursor = page.cursor;
        }

        debug!(collection, count = all_documents.len(), "scanned collection");
        Ok(all_documents)
    }

    async fn query_in(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        if values.is_empty() {
            return Err(StoreError::InvalidRequest(
                "query_in requires at least one value".to_string(),
            ));
        }

        #[derive(Serialize)]
        struct QueryRequest<'a> {
            field: &'a str,
            #[serde(rename = "in")]
            values: &'a [String],
        }

        let url = format!(
            "{}/v1/collections/{}/documents:query",
            self.base_url, collection
        );

        let response = self
            .post(&url)
            .json(&QueryRequest { field, values })
            .send()
            .await?;

        let result: QueryResponse = self.handle_response(response).await?;
        Ok(result.documents)
    }

    async fn commit(&self, writes: Vec<DocumentUpdate>) -> Result<usize, StoreError> {
        if writes.is_empty() {
            return Err(StoreError::InvalidRequest(
                "commit requires at least one write".to_string(),
            ));
        }

        #[derive(Serialize)]
        struct CommitRequest {
            writes: Vec<DocumentUpdate>,
        }

        let url = format!("{}/v1/documents:commit", self.base_url);

        debug!(count = writes.len(), "committing batch write");
        let response = self.post(&url).json(&CommitRequest { writes }).send().await?;

        let result: CommitResponse = self.handle_response(response).await?;
        Ok(result.applied)
    }
}
