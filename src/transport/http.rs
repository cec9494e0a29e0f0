use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

use super::{FetchError, Transport};

/// Tunables for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Response bodies above this are rejected
    pub max_body_bytes: usize,
    /// Retries for 429/5xx/incomplete responses on `fetch`
    pub max_retries: u32,
    /// First backoff delay; doubles per retry
    pub backoff_base: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            user_agent: concat!("hubbub/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// `reqwest`-backed [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    fn backoff(&self, retry: u32) -> Duration {
        self.config.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Fetches a document, retrying 429, 5xx and truncated bodies with
    /// exponential backoff. 4xx fails immediately.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let response = tokio::time::timeout(
                self.config.request_timeout,
                self.client.get(url).send(),
            )
            .await
            .map_err(|_| FetchError::Timeout)??;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.config.max_retries {
                    return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        FetchError::RateLimited(self.config.max_retries)
                    } else {
                        FetchError::HttpStatus(status.as_u16())
                    });
                }

                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Remote busy or failing, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, self.config.max_body_bytes).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received })
                    if retry_count < self.config.max_retries =>
                {
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<u16, FetchError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().copied())
            .finish();

        let response = tokio::time::timeout(
            self.config.request_timeout,
            self.client
                .post(url)
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)??;

        Ok(response.status().as_u16())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_transport() -> HttpTransport {
        HttpTransport::new(HttpConfig {
            request_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(10),
            ..HttpConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.atom"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<feed/>"))
            .mount(&server)
            .await;

        let body = fast_transport()
            .fetch(&format!("{}/feed.atom", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"<feed/>");
    }

    #[tokio::test]
    async fn test_fetch_404_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fast_transport().fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_fetch_500_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // Initial request + 3 retries
            .mount(&server)
            .await;

        let err = fast_transport().fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn test_fetch_503_then_success() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = fast_transport().fetch(&server.uri()).await.unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_fetch_429_exhausts_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = fast_transport().fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited(3)));
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpConfig {
            max_body_bytes: 16,
            ..HttpConfig::default()
        })
        .unwrap();
        let err = transport.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpConfig {
            request_timeout: Duration::from_millis(50),
            ..HttpConfig::default()
        })
        .unwrap();
        let err = transport.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_post_form_encodes_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string(
                "hub.mode=publish&hub.url=https%3A%2F%2Fsocial.example.com%2Ffeeds%2F1.atom",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let status = fast_transport()
            .post_form(
                &server.uri(),
                &[
                    ("hub.mode", "publish"),
                    ("hub.url", "https://social.example.com/feeds/1.atom"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(status, 204);
    }

    #[tokio::test]
    async fn test_post_form_returns_error_status_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let status = fast_transport()
            .post_form(&server.uri(), &[("hub.mode", "publish")])
            .await
            .unwrap();
        assert_eq!(status, 503);
    }
}
