use std::time::Duration;

use hearth_core::config::PipelineConfig;
use hearth_core::error::AppError;
use hearth_core::headers::HeaderSet;
use hearth_core::models::FetchResponse;
use hearth_core::traits::Fetcher;
use reqwest::{Client, redirect};

/// HTTP fetcher using reqwest.
///
/// Performs exactly one GET per call with the caller's header set. Every
/// status comes back as a [`FetchResponse`]; deciding whether a 403 or a
/// challenge page is a failure is left to
/// [`ResilientFetcher`](hearth_core::retry::ResilientFetcher).
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::from_config(&PipelineConfig::default())
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, AppError> {
        Self::with_options(config.fetch_timeout, config.max_redirects)
    }

    pub fn with_options(timeout: Duration, max_redirects: usize) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, headers: &HeaderSet) -> Result<FetchResponse, AppError> {
        let mut request = self.client.get(url);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::FetchTimeout(self.timeout_secs)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })?;

        tracing::debug!(%url, %final_url, status, bytes = body.len(), "GET complete");
        Ok(FetchResponse { status, body })
    }
}

impl ReqwestFetcher {
    fn classify(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::FetchTimeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else if e.is_redirect() {
            AppError::HttpError(format!("Too many redirects: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response on a local port; the task yields the raw
    /// request it received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{addr}/home/1"), handle)
    }

    #[tokio::test]
    async fn test_sends_header_set() {
        let (url, server) = serve_once("200 OK", "<html>ok</html>").await;
        let fetcher = ReqwestFetcher::new().unwrap();
        let headers = HeaderSet::from_pairs(&[
            ("User-Agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/125.0"),
            ("Referer", "https://www.redfin.com/"),
        ]);

        let response = fetcher.fetch(&url, &headers).await.unwrap();
        let request = server.await.unwrap().to_lowercase();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html>ok</html>");
        assert!(request.contains("user-agent: mozilla/5.0 (x11; linux x86_64) firefox/125.0"));
        assert!(request.contains("referer: https://www.redfin.com/"));
    }

    #[tokio::test]
    async fn test_error_statuses_are_returned_not_raised() {
        let (url, server) = serve_once("403 Forbidden", "<html>Access Denied</html>").await;
        let fetcher = ReqwestFetcher::new().unwrap();

        let response = fetcher.fetch(&url, &HeaderSet::new()).await.unwrap();
        server.await.unwrap();

        assert_eq!(response.status, 403);
        assert!(response.body.contains("Access Denied"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port with nothing listening.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let fetcher = ReqwestFetcher::with_options(Duration::from_secs(5), 5).unwrap();

        let err = fetcher
            .fetch(&format!("http://{addr}/"), &HeaderSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)), "{err}");
    }

    #[tokio::test]
    async fn test_stalled_server_is_fetch_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let fetcher = ReqwestFetcher::with_options(Duration::from_secs(1), 5).unwrap();

        let err = fetcher
            .fetch(&format!("http://{addr}/"), &HeaderSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FetchTimeout(1)), "{err}");
    }
}
