//! HTTP implementation of [`UploadTransport`] on top of `reqwest`.

use castup_protocol::constants::STATUS_QUERY_PARAM;
use castup_protocol::{ChunkUploadResponse, CompleteUploadRequest, CompletionResponse, ServerStatus, fields};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::TransportError;
use crate::transport::{ChunkPayload, TransportFuture, UploadTransport};

/// Talks to the upload backend over HTTP.
///
/// Endpoints are resolved against `base_url` unless they are absolute
/// `http(s)://` URLs. Cookies set by the backend are kept for later requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_headers(base_url, &[])
    }

    /// Creates a transport that sends `headers` with every request.
    pub fn with_headers(
        base_url: impl Into<String>,
        headers: &[(String, String)],
    ) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Config(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Config(format!("invalid value for header {name}: {e}")))?;
            default_headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(default_headers)
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves an endpoint path against the base URL.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        }
    }

    async fn send_chunk(&self, endpoint: &str, chunk: ChunkPayload) -> Result<(), TransportError> {
        let url = self.url(endpoint);
        let index = chunk.chunk_index;
        debug!(%url, chunk = index, bytes = chunk.data.len(), "posting chunk");

        let len = chunk.data.len() as u64;
        let file = Part::stream_with_length(chunk.data, len).file_name(chunk.filename.clone());
        let form = Form::new()
            .part(fields::FILE, file)
            .text(fields::FILENAME, chunk.filename)
            .text(fields::CHUNK_INDEX, chunk.chunk_index.to_string())
            .text(fields::TOTAL_CHUNKS, chunk.total_chunks.to_string())
            .text(fields::UPLOAD_ID, chunk.upload_id);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let body: ChunkUploadResponse = read_json(response).await?;
        body.into_result().map_err(TransportError::Rejected)
    }

    async fn send_complete(
        &self,
        endpoint: &str,
        request: &CompleteUploadRequest,
    ) -> Result<CompletionResponse, TransportError> {
        let url = self.url(endpoint);
        debug!(%url, upload_id = %request.upload_id, "requesting completion");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        read_json(response).await
    }

    async fn fetch_status(&self, endpoint: &str, upload_id: &str) -> Result<ServerStatus, TransportError> {
        let url = self.url(endpoint);
        debug!(%url, %upload_id, "checking upload status");

        let response = self
            .client
            .get(&url)
            .query(&[(STATUS_QUERY_PARAM, upload_id)])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        read_json(response).await
    }
}

impl UploadTransport for HttpTransport {
    fn upload_chunk<'a>(&'a self, endpoint: &'a str, chunk: ChunkPayload) -> TransportFuture<'a, ()> {
        Box::pin(self.send_chunk(endpoint, chunk))
    }

    fn complete<'a>(
        &'a self,
        endpoint: &'a str,
        request: &'a CompleteUploadRequest,
    ) -> TransportFuture<'a, CompletionResponse> {
        Box::pin(self.send_complete(endpoint, request))
    }

    fn status<'a>(&'a self, endpoint: &'a str, upload_id: &'a str) -> TransportFuture<'a, ServerStatus> {
        Box::pin(self.fetch_status(endpoint, upload_id))
    }
}

/// Checks the status code and decodes a JSON body.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::from_status(status.as_u16()));
    }
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// A request as seen by the mock server.
    struct Recorded {
        head: String,
        body: Vec<u8>,
    }

    impl Recorded {
        fn request_line(&self) -> &str {
            self.head.lines().next().unwrap_or_default()
        }

        fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    /// Serves one canned `(status, body)` response per connection and
    /// returns the recorded requests.
    async fn mock_server(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Recorded>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut recorded = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                recorded.push(read_request(&mut stream).await);
                let response = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            recorded
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(stream: &mut TcpStream) -> Recorded {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 8192];
        let header_end = loop {
            let n = stream.read(&mut tmp).await.unwrap();
            assert!(n > 0, "connection closed before headers were complete");
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let lower = head.to_ascii_lowercase();
        let mut body = buf[header_end..].to_vec();

        if lower.contains("transfer-encoding: chunked") {
            while find(&body, b"0\r\n\r\n").is_none() {
                let n = stream.read(&mut tmp).await.unwrap();
                assert!(n > 0, "connection closed inside chunked body");
                body.extend_from_slice(&tmp[..n]);
            }
            body = decode_chunked(&body);
        } else {
            let content_length = lower
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while body.len() < content_length {
                let n = stream.read(&mut tmp).await.unwrap();
                assert!(n > 0, "connection closed inside body");
                body.extend_from_slice(&tmp[..n]);
            }
        }
        Recorded { head, body }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn decode_chunked(mut raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let line_end = find(raw, b"\r\n").unwrap();
            let size_str = String::from_utf8_lossy(&raw[..line_end]);
            let size = usize::from_str_radix(size_str.split(';').next().unwrap().trim(), 16).unwrap();
            raw = &raw[line_end + 2..];
            if size == 0 {
                return out;
            }
            out.extend_from_slice(&raw[..size]);
            raw = &raw[size + 2..];
        }
    }

    fn payload(index: usize, data: &[u8]) -> ChunkPayload {
        ChunkPayload {
            upload_id: "upload_abc".into(),
            filename: "song.mp3".into(),
            chunk_index: index,
            total_chunks: 4,
            data: Bytes::copy_from_slice(data),
        }
    }

    #[test]
    fn url_resolution() {
        let transport = HttpTransport::new("http://localhost:8080/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080");
        assert_eq!(
            transport.url("/api/upload/chunk"),
            "http://localhost:8080/api/upload/chunk"
        );
        assert_eq!(transport.url("api/upload/chunk"), "http://localhost:8080/api/upload/chunk");
        assert_eq!(
            transport.url("https://cdn.example.com/chunk"),
            "https://cdn.example.com/chunk"
        );
    }

    #[test]
    fn invalid_header_rejected() {
        let err = HttpTransport::with_headers("http://localhost", &[("bad header".into(), "v".into())])
            .unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[tokio::test]
    async fn chunk_is_posted_as_multipart() {
        let (base, server) = mock_server(vec![(200, r#"{"success":true}"#)]).await;
        let transport = HttpTransport::with_headers(&base, &[("x-csrf-token".into(), "t0k3n".into())]).unwrap();

        transport
            .upload_chunk("/api/upload/chunk", payload(2, b"chunk-bytes"))
            .await
            .unwrap();

        let recorded = server.await.unwrap();
        let req = &recorded[0];
        assert!(req.request_line().starts_with("POST /api/upload/chunk "));
        assert!(req.head.to_ascii_lowercase().contains("x-csrf-token: t0k3n"));
        assert!(req.head.to_ascii_lowercase().contains("multipart/form-data"));

        let body = req.body_text();
        assert!(body.contains(r#"name="file"; filename="song.mp3""#));
        assert!(body.contains("chunk-bytes"));
        assert!(body.contains("name=\"filename\"\r\n\r\nsong.mp3"));
        assert!(body.contains("name=\"chunkIndex\"\r\n\r\n2"));
        assert!(body.contains("name=\"totalChunks\"\r\n\r\n4"));
        assert!(body.contains("name=\"uploadId\"\r\n\r\nupload_abc"));
    }

    #[tokio::test]
    async fn chunk_refused_by_body() {
        let (base, _server) = mock_server(vec![(200, r#"{"success":false,"error":"disk full"}"#)]).await;
        let transport = HttpTransport::new(base).unwrap();

        let err = transport
            .upload_chunk("/api/upload/chunk", payload(0, b"x"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Rejected("disk full".into()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn chunk_status_codes_map_to_messages() {
        let (base, _server) = mock_server(vec![(413, "{}"), (503, "{}")]).await;
        let transport = HttpTransport::new(base).unwrap();

        let err = transport
            .upload_chunk("/api/upload/chunk", payload(0, b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "chunk too large (HTTP 413)");
        assert!(!err.is_retryable());

        let err = transport
            .upload_chunk("/api/upload/chunk", payload(0, b"x"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::from_status(503));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn chunk_non_json_body_is_decode_error() {
        let (base, _server) = mock_server(vec![(200, "<html>ok</html>")]).await;
        let transport = HttpTransport::new(base).unwrap();

        let err = transport
            .upload_chunk("/api/upload/chunk", payload(0, b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn complete_posts_json() {
        let (base, server) = mock_server(vec![(200, r#"{"path":"/media/song.mp3","size":42}"#)]).await;
        let transport = HttpTransport::new(base).unwrap();

        let request = CompleteUploadRequest {
            upload_id: "upload_abc".into(),
        };
        let response = transport
            .complete("/api/upload/complete", &request)
            .await
            .unwrap();
        assert_eq!(response.get("size").unwrap(), 42);
        assert!(response.error().is_none());

        let recorded = server.await.unwrap();
        let req = &recorded[0];
        assert!(req.request_line().starts_with("POST /api/upload/complete "));
        assert!(req.head.to_ascii_lowercase().contains("content-type: application/json"));
        let sent: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(sent, serde_json::json!({ "uploadId": "upload_abc" }));
    }

    #[tokio::test]
    async fn complete_passes_error_body_through() {
        let (base, _server) = mock_server(vec![(200, r#"{"error":"missing chunk 3"}"#)]).await;
        let transport = HttpTransport::new(base).unwrap();

        let request = CompleteUploadRequest {
            upload_id: "upload_abc".into(),
        };
        let response = transport
            .complete("/api/upload/complete", &request)
            .await
            .unwrap();
        assert_eq!(response.error(), Some("missing chunk 3"));
    }

    #[tokio::test]
    async fn status_sends_upload_id_query() {
        let (base, server) = mock_server(vec![(200, r#"{"received":[0,1],"total":4}"#)]).await;
        let transport = HttpTransport::new(base).unwrap();

        let status = transport
            .status("/api/upload/status", "upload_abc")
            .await
            .unwrap();
        assert_eq!(status.0["total"], 4);

        let recorded = server.await.unwrap();
        assert!(
            recorded[0]
                .request_line()
                .starts_with("GET /api/upload/status?uploadId=upload_abc ")
        );
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(format!("http://{addr}")).unwrap();
        let err = transport
            .upload_chunk("/api/upload/chunk", payload(0, b"x"))
            .await
            .unwrap_err();
        assert!(err.is_network(), "{err:?}");
        assert!(err.is_retryable());
    }
}
