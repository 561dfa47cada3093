//! HTTP client for a block-oriented object store
//!
//! The wire surface is query-parameter verbs on container/blob paths
//! (`?comp=block`, `?comp=blocklist`, `?restype=container`, ...), user
//! metadata as `x-meta-*` headers, and small hand-built XML documents for
//! block lists, tags, and error bodies.

use crate::config::Config;
use crate::error::{CommitError, Result, StageError, StoreError};
use crate::types::{BlobProperties, BlockId, ContainerProperties, PublicAccess};
use crate::StorageService;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Header carrying the container public access level
const PUBLIC_ACCESS_HEADER: &str = "x-blob-public-access";

/// Prefix for user metadata headers
const META_PREFIX: &str = "x-meta-";

/// Remote storage service client
pub struct RemoteStore {
    config: Config,
    http: Client,
}

impl RemoteStore {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| StoreError::Configuration("invalid user agent".to_string()))?,
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { config, http })
    }

    /// Create with endpoint URL and defaults otherwise
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Self::new(Config::new(endpoint))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => req.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }

    /// Send a request, mapping non-success responses to `StoreError`
    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = self.authorize(req).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }
}

#[async_trait]
impl StorageService for RemoteStore {
    #[instrument(skip(self, payload), fields(size = payload.len()))]
    async fn stage_block(
        &self,
        container: &str,
        blob: &str,
        block_id: &BlockId,
        payload: Bytes,
    ) -> std::result::Result<(), StageError> {
        let url = self.url(&format!(
            "/{container}/{blob}?comp=block&blockid={block_id}"
        ));
        let req = self.authorize(self.http.put(&url).body(payload));

        let response = req
            .send()
            .await
            .map_err(|e| StageError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(%block_id, "block staged");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StageError::rejected(
            status.as_u16(),
            extract_xml_value(&body, "Code").unwrap_or_else(|| format!("HTTP{}", status.as_u16())),
            extract_xml_value(&body, "Message").unwrap_or_else(|| "unknown error".to_string()),
        ))
    }

    #[instrument(skip(self, block_ids), fields(blocks = block_ids.len()))]
    async fn commit_block_list(
        &self,
        container: &str,
        blob: &str,
        block_ids: &[BlockId],
    ) -> std::result::Result<(), CommitError> {
        let mut xml = String::from("<BlockList>");
        for id in block_ids {
            xml.push_str(&format!("<Latest>{id}</Latest>"));
        }
        xml.push_str("</BlockList>");

        let url = self.url(&format!("/{container}/{blob}?comp=blocklist"));
        let req = self.authorize(
            self.http
                .put(&url)
                .header(header::CONTENT_TYPE, "application/xml")
                .body(xml),
        );

        let response = req
            .send()
            .await
            .map_err(|e| CommitError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(blocks = block_ids.len(), "block list committed");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(CommitError::rejected(
            status.as_u16(),
            extract_xml_value(&body, "Code").unwrap_or_else(|| format!("HTTP{}", status.as_u16())),
            extract_xml_value(&body, "Message").unwrap_or_else(|| "unknown error".to_string()),
        ))
    }

    #[instrument(skip(self))]
    async fn create_container(&self, container: &str) -> Result<()> {
        let url = self.url(&format!("/{container}?restype=container"));
        self.send(self.http.put(&url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_container_properties(&self, container: &str) -> Result<ContainerProperties> {
        let url = self.url(&format!("/{container}?restype=container"));
        let response = self.send(self.http.get(&url)).await?;

        let public_access = response
            .headers()
            .get(PUBLIC_ACCESS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(PublicAccess::parse)
            .unwrap_or_default();
        let last_modified = parse_last_modified(&response)?;

        let mut metadata = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Some(key) = name.as_str().strip_prefix(META_PREFIX) {
                if let Ok(value) = value.to_str() {
                    metadata.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(ContainerProperties {
            public_access,
            last_modified,
            metadata,
        })
    }

    #[instrument(skip(self, metadata))]
    async fn set_container_metadata(
        &self,
        container: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<()> {
        let url = self.url(&format!("/{container}?restype=container&comp=metadata"));
        let mut req = self.http.put(&url);
        for (key, value) in &metadata {
            req = req.header(format!("{META_PREFIX}{key}"), value);
        }
        self.send(req).await?;
        Ok(())
    }

    #[instrument(skip(self, payload), fields(size = payload.len()))]
    async fn put_blob(&self, container: &str, blob: &str, payload: Bytes) -> Result<()> {
        let url = self.url(&format!("/{container}/{blob}"));
        self.send(self.http.put(&url).body(payload)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        let url = self.url(&format!("/{container}/{blob}"));
        let response = self.send(self.http.head(&url)).await?;

        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StoreError::InvalidResponse("missing Content-Length".to_string()))?;
        let last_modified = parse_last_modified(&response)?;

        Ok(BlobProperties {
            content_length,
            last_modified,
        })
    }

    #[instrument(skip(self))]
    async fn get_blob_range(
        &self,
        container: &str,
        blob: &str,
        offset: u64,
        length: u64,
    ) -> Result<Bytes> {
        let url = self.url(&format!("/{container}/{blob}"));
        let end = offset + length.saturating_sub(1);
        let req = self
            .http
            .get(&url)
            .header(header::RANGE, format!("bytes={offset}-{end}"));
        let response = self.send(req).await?;
        Ok(response.bytes().await?)
    }

    #[instrument(skip(self, tags))]
    async fn set_blob_tags(
        &self,
        container: &str,
        blob: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut xml = String::from("<Tags><TagSet>");
        for (key, value) in &tags {
            xml.push_str(&format!(
                "<Tag><Key>{key}</Key><Value>{value}</Value></Tag>"
            ));
        }
        xml.push_str("</TagSet></Tags>");

        let url = self.url(&format!("/{container}/{blob}?comp=tags"));
        let req = self
            .http
            .put(&url)
            .header(header::CONTENT_TYPE, "application/xml")
            .body(xml);
        self.send(req).await?;
        Ok(())
    }
}

fn parse_last_modified(response: &Response) -> Result<DateTime<Utc>> {
    response
        .headers()
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| StoreError::InvalidResponse("missing or malformed Last-Modified".to_string()))
}

/// Map an error response body to a `StoreError`
fn error_from_body(status: StatusCode, body: &str) -> StoreError {
    let code = extract_xml_value(body, "Code")
        .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));
    let message =
        extract_xml_value(body, "Message").unwrap_or_else(|| "unknown error".to_string());
    StoreError::Service {
        status: status.as_u16(),
        code,
        message,
    }
}

fn extract_xml_value(xml: &str, element: &str) -> Option<String> {
    let start_tag = format!("<{}>", element);
    let end_tag = format!("</{}>", element);

    let start = xml.find(&start_tag)? + start_tag.len();
    let end = xml.find(&end_tag)?;

    if start < end {
        Some(xml[start..end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer) -> RemoteStore {
        RemoteStore::with_endpoint(&server.uri()).unwrap()
    }

    #[tokio::test]
    async fn stage_block_puts_to_block_endpoint() {
        let server = MockServer::start().await;
        let id = BlockId::generate();

        Mock::given(method("PUT"))
            .and(path("/c/b.bin"))
            .and(query_param("comp", "block"))
            .and(query_param("blockid", id.as_str()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .await
            .stage_block("c", "b.bin", &id, Bytes::from_static(b"payload"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stage_block_maps_service_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/c/b.bin"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<Error><Code>ContainerNotFound</Code><Message>no such container</Message></Error>",
            ))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .stage_block("c", "b.bin", &BlockId::generate(), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.code, "ContainerNotFound");
    }

    #[tokio::test]
    async fn commit_sends_ordered_block_list_xml() {
        let server = MockServer::start().await;
        let first = BlockId::from_encoded("AAAA");
        let second = BlockId::from_encoded("BBBB");

        Mock::given(method("PUT"))
            .and(path("/c/b.bin"))
            .and(query_param("comp", "blocklist"))
            .and(body_string_contains(
                "<BlockList><Latest>AAAA</Latest><Latest>BBBB</Latest></BlockList>",
            ))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .await
            .commit_block_list("c", "b.bin", &[first, second])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn commit_rejection_surfaces_code() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(query_param("comp", "blocklist"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<Error><Code>InvalidBlockList</Code><Message>expired block</Message></Error>",
            ))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .commit_block_list("c", "b.bin", &[BlockId::generate()])
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.code, "InvalidBlockList");
        assert_eq!(err.message, "expired block");
    }

    #[tokio::test]
    async fn container_properties_parse_headers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/c"))
            .and(query_param("restype", "container"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-blob-public-access", "blob")
                    .insert_header("Last-Modified", "Wed, 01 Jan 2025 12:00:00 GMT")
                    .insert_header("x-meta-doctype", "textDocuments")
                    .insert_header("x-meta-category", "guidance"),
            )
            .mount(&server)
            .await;

        let props = store(&server)
            .await
            .get_container_properties("c")
            .await
            .unwrap();
        assert_eq!(props.public_access, PublicAccess::Blob);
        assert_eq!(props.metadata["doctype"], "textDocuments");
        assert_eq!(props.metadata["category"], "guidance");
    }

    #[tokio::test]
    async fn set_metadata_sends_meta_headers() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/c"))
            .and(query_param("comp", "metadata"))
            .and(header("x-meta-doctype", "textDocuments"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut metadata = BTreeMap::new();
        metadata.insert("doctype".to_string(), "textDocuments".to_string());
        store(&server)
            .await
            .set_container_metadata("c", metadata)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn blob_range_sends_range_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/c/b.bin"))
            .and(header("Range", "bytes=4-7"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"4567".to_vec()))
            .mount(&server)
            .await;

        let bytes = store(&server)
            .await
            .get_blob_range("c", "b.bin", 4, 4)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"4567");
    }

    #[tokio::test]
    async fn bearer_token_is_attached() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/c"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RemoteStore::new(Config::new(server.uri()).with_token("secret")).unwrap();
        store.create_container("c").await.unwrap();
    }
}
