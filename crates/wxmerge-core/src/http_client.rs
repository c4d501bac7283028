use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    BearerToken(String),
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::BearerToken(token) => {
                headers.insert(String::from("authorization"), format!("Bearer {token}"));
            }
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

/// GET request used by adapter transport calls. Every upstream is read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 5_000,
        }
    }

    /// Builds a GET request with URL-encoded query parameters.
    pub fn get_with_query<'q>(
        base: &str,
        params: impl IntoIterator<Item = (&'q str, &'q str)>,
    ) -> Self {
        let query = params
            .into_iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            Self::get(base)
        } else {
            Self::get(format!("{base}?{query}"))
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// HTTP response envelope returned by an adapter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timeout: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_timeout(&self) -> bool {
        self.timeout
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Adapter transport contract that supports async execution and auth-aware requests.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Production HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("wxmerge/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            builder = builder.timeout(Duration::from_millis(request.timeout_ms));

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

#[derive(Debug, Clone)]
struct StaticRoute {
    pattern: String,
    response: Result<HttpResponse, HttpError>,
    delay: Option<Duration>,
}

/// Offline transport returning canned responses keyed by URL substring.
///
/// Routes are matched in registration order; unmatched requests get a 404.
/// Every request is recorded for later inspection.
#[derive(Debug, Default)]
pub struct StaticHttpClient {
    routes: Vec<StaticRoute>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, pattern: impl Into<String>, response: HttpResponse) -> Self {
        self.route(pattern, Ok(response), None)
    }

    pub fn with_json(self, pattern: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_response(pattern, HttpResponse::ok(body))
    }

    pub fn with_error(self, pattern: impl Into<String>, error: HttpError) -> Self {
        self.route(pattern, Err(error), None)
    }

    /// Responds only after `delay`, for exercising request timeouts.
    pub fn with_delayed(
        self,
        pattern: impl Into<String>,
        response: HttpResponse,
        delay: Duration,
    ) -> Self {
        self.route(pattern, Ok(response), Some(delay))
    }

    fn route(
        mut self,
        pattern: impl Into<String>,
        response: Result<HttpResponse, HttpError>,
        delay: Option<Duration>,
    ) -> Self {
        self.routes.push(StaticRoute {
            pattern: pattern.into(),
            response,
            delay,
        });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request log lock is not poisoned")
            .clone()
    }

    pub fn request_count(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .expect("request log lock is not poisoned")
            .iter()
            .filter(|request| request.url.contains(pattern))
            .count()
    }
}

impl HttpClient for StaticHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let route = self
            .routes
            .iter()
            .find(|route| request.url.contains(&route.pattern))
            .cloned();
        self.requests
            .lock()
            .expect("request log lock is not poisoned")
            .push(request);

        Box::pin(async move {
            let Some(route) = route else {
                return Ok(HttpResponse::with_status(404, "not found"));
            };
            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            route.response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_auth_populates_authorization_header() {
        let request = HttpRequest::get("https://peer.example/api/weather/KSPB")
            .with_auth(&HttpAuth::BearerToken(String::from("shared-secret")));

        assert_eq!(request.header("Authorization"), Some("Bearer shared-secret"));
    }

    #[test]
    fn custom_header_auth_preserves_name_and_value() {
        let request = HttpRequest::get("https://api.weather.gov/stations/KSPB/observations/latest")
            .with_auth(&HttpAuth::Header {
                name: String::from("User-Agent"),
                value: String::from("wxmerge (ops@example.org)"),
            });

        assert_eq!(
            request.headers.get("user-agent").map(String::as_str),
            Some("wxmerge (ops@example.org)")
        );
    }

    #[test]
    fn query_parameters_are_url_encoded() {
        let request = HttpRequest::get_with_query(
            "https://api.example/obs",
            [("token", "a b&c"), ("station", "KSPB")],
        );
        assert_eq!(request.url, "https://api.example/obs?token=a%20b%26c&station=KSPB");
    }

    #[test]
    fn requests_carry_only_url_headers_and_timeout() {
        let request = HttpRequest::get("https://api.example/obs").with_timeout_ms(750);
        assert_eq!(
            request,
            HttpRequest {
                url: String::from("https://api.example/obs"),
                headers: BTreeMap::new(),
                timeout_ms: 750,
            }
        );
    }

    #[tokio::test]
    async fn static_client_matches_routes_and_records_requests() {
        // Given
        let client = StaticHttpClient::new()
            .with_json("metar", r#"{"ok":true}"#)
            .with_error("nws", HttpError::new("connection refused"));

        // When
        let metar = client.execute(HttpRequest::get("https://x/metar?ids=KSPB")).await;
        let nws = client.execute(HttpRequest::get("https://x/nws")).await;
        let other = client.execute(HttpRequest::get("https://x/other")).await;

        // Then
        assert_eq!(metar.map(|r| r.status), Ok(200));
        assert!(nws.is_err());
        assert_eq!(other.map(|r| r.status), Ok(404));
        assert_eq!(client.requests().len(), 3);
        assert_eq!(client.request_count("metar"), 1);
    }
}
