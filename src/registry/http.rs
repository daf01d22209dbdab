//! Generic HTTP access shared by every registry adapter
//!
//! [`HttpAccess`] knows how to reach one service: base URL, TLS policy,
//! authentication and paginated listing. Resource-specific adapters hold one
//! and add only the paths, item fields and accumulators they care about.

use crate::config::Credentials;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::migration::pagination::{traverse, Page};
use crate::registry::auth::{AuthChallenge, TokenAuth};
use reqwest::header::{HeaderMap, LINK, WWW_AUTHENTICATE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Items requested per page where the API lets the client choose
pub const PAGE_SIZE: usize = 100;

const REQUEST_TIMEOUT_SECS: u64 = 7200;

/// How a service authenticates requests
#[derive(Debug, Clone)]
pub enum AuthMode {
    Anonymous,
    /// Credentials sent with every request
    Basic(Credentials),
    /// Static OAuth2 token sent with every request
    Bearer(String),
    /// Answer `WWW-Authenticate` challenges, with or without credentials
    Challenge(Option<Credentials>),
}

/// How a listing endpoint hands out its next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationStyle {
    /// Registry API v2: `?n=` plus an RFC 5988 `Link: <...>; rel="next"` header
    LinkHeader,
    /// Cursor in a body field, sent back as a query parameter of the same name
    NextPageField { field: &'static str },
    /// `?start=&limit=`. The next start comes from the body field `field` or,
    /// when the body has no such field and the page is full, from `item_key`
    /// of the last item.
    StartParameter {
        field: &'static str,
        item_key: &'static str,
    },
}

/// HTTP access to one service
#[derive(Debug)]
pub struct HttpAccess {
    client: Client,
    base_url: Url,
    auth: AuthMode,
    tokens: TokenAuth,
    logger: Logger,
}

impl HttpAccess {
    pub fn new(base_url: &str, auth: AuthMode, ignore_cert: bool, logger: Logger) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        if ignore_cert {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| RegistryError::Network(format!("Failed to create HTTP client: {}", e)))?;

        // A trailing slash makes relative joins append instead of replace
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            tokens: TokenAuth::new(client.clone(), logger.clone()),
            client,
            base_url,
            auth,
            logger,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Resolve a path relative to the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        Ok(self.base_url.join(path.trim_start_matches('/'))?.to_string())
    }

    /// Resolve a reference the server handed out (`Link` or `Location`)
    pub fn resolve_reference(&self, reference: &str) -> Result<String> {
        Ok(self.base_url.join(reference)?.to_string())
    }

    /// URL built from percent-encoded path segments below the base URL
    pub fn url_for_segments(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RegistryError::Validation(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request, answering one authentication challenge if needed.
    ///
    /// `scope` names the registry token scope the request needs; tokens are
    /// cached under it.
    pub async fn send(&self, request: RequestBuilder, scope: Option<&str>) -> Result<Response> {
        let retry = request.try_clone();
        let response = self
            .authorize(request, scope)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "request"))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let (AuthMode::Challenge(credentials), Some(retry)) = (&self.auth, retry) else {
            return Ok(response);
        };
        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(AuthChallenge::parse)
        else {
            return Ok(response);
        };

        let retry = match &challenge {
            AuthChallenge::Basic => match credentials {
                Some(credentials) => {
                    retry.basic_auth(&credentials.username, Some(&credentials.password))
                }
                None => return Ok(response),
            },
            AuthChallenge::Bearer { .. } => {
                let key = scope.unwrap_or_default();
                self.logger
                    .detail(&format!("Authenticating for scope '{}'", key));
                let token = self
                    .tokens
                    .fetch_token(key, &challenge, scope, credentials.as_ref())
                    .await?;
                retry.bearer_auth(token)
            }
        };

        retry
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "request"))
    }

    fn authorize(&self, request: RequestBuilder, scope: Option<&str>) -> RequestBuilder {
        match &self.auth {
            AuthMode::Anonymous => request,
            AuthMode::Basic(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            AuthMode::Bearer(token) => request.bearer_auth(token),
            AuthMode::Challenge(_) => match self.tokens.cached(scope.unwrap_or_default()) {
                Some(token) => request.bearer_auth(token),
                None => request,
            },
        }
    }

    /// GET a path and report only whether it answered with a success status
    pub async fn is_reachable(&self, path: &str) -> bool {
        let Ok(url) = self.url(path) else {
            return false;
        };
        match self.send(self.request(Method::GET, &url), None).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                self.logger.verbose(&format!("GET {} failed: {}", url, e));
                false
            }
        }
    }

    /// GET a path and parse the body as JSON
    pub async fn get_json(
        &self,
        path: &str,
        scope: Option<&str>,
        operation: &str,
    ) -> Result<Value> {
        let (body, _) = self.get_json_with_headers(path, scope, operation).await?;
        Ok(body)
    }

    async fn get_json_with_headers(
        &self,
        path: &str,
        scope: Option<&str>,
        operation: &str,
    ) -> Result<(Value, HeaderMap)> {
        let url = self.url(path)?;
        self.logger.detail(&format!("GET {}", url));

        let response = self.send(self.request(Method::GET, &url), scope).await?;
        let response = check_status(response, operation).await?;
        let headers = response.headers().clone();
        let body = response.json::<Value>().await.map_err(|e| {
            RegistryError::Parse(format!("Failed to parse {} response: {}", operation, e))
        })?;

        Ok((body, headers))
    }

    /// Fetch one page of a listing.
    ///
    /// `items_field` names the body array holding the page items; a missing or
    /// `null` array is an empty page.
    pub async fn fetch_page(
        &self,
        path: &str,
        items_field: &str,
        style: &PaginationStyle,
        cursor: Option<String>,
        scope: Option<&str>,
    ) -> Result<Page<Value>> {
        let page_path = page_path(path, style, cursor.as_deref());
        let (body, headers) = self
            .get_json_with_headers(&page_path, scope, &format!("listing of {}", path))
            .await?;

        let items = match body.get(items_field) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(RegistryError::Parse(format!(
                    "Field '{}' of {} is not a list: {}",
                    items_field, path, other
                )))
            }
        };

        let next = match style {
            PaginationStyle::LinkHeader => next_link(&headers)
                .map(|link| self.resolve_reference(&link))
                .transpose()?,
            PaginationStyle::NextPageField { field } => body.get(*field).and_then(cursor_value),
            PaginationStyle::StartParameter { field, item_key } => {
                next_start(&body, &items, field, item_key)
            }
        };

        Ok(Page::new(items, next))
    }

    /// Traverse every page of a listing, folding pages with `accumulate`
    pub async fn get_with_pagination<R, A>(
        &self,
        path: &str,
        items_field: &str,
        style: PaginationStyle,
        scope: Option<&str>,
        accumulate: A,
    ) -> Result<Vec<R>>
    where
        A: FnMut(&mut Vec<R>, Vec<Value>),
    {
        let style = &style;
        traverse(
            |cursor| self.fetch_page(path, items_field, style, cursor, scope),
            accumulate,
        )
        .await
    }
}

/// Turn a non-success response into an error, keeping success responses
pub async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());
    Err(HttpErrorHandler::handle_registry_error(status, &error_text, operation))
}

/// Follow a dotted path such as `member.name` into a JSON value
pub fn extract_field<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(item, |value, key| value.get(key))
}

/// String form of a field for use as a name or cursor
pub fn extract_string(item: &Value, path: &str) -> Option<String> {
    extract_field(item, path).and_then(cursor_value)
}

fn cursor_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Start of the page after `items` in a `start`/`limit` listing
fn next_start(body: &Value, items: &[Value], field: &str, item_key: &str) -> Option<String> {
    match body.get(field) {
        Some(value) => cursor_value(value),
        None if items.len() >= PAGE_SIZE => {
            items.last().and_then(|item| extract_string(item, item_key))
        }
        None => None,
    }
}

fn page_path(path: &str, style: &PaginationStyle, cursor: Option<&str>) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    match (style, cursor) {
        // The Link target already carries every query parameter
        (PaginationStyle::LinkHeader, Some(next)) => next.to_string(),
        (PaginationStyle::LinkHeader, None) => format!("{}{}n={}", path, separator, PAGE_SIZE),
        (PaginationStyle::NextPageField { .. }, None) => path.to_string(),
        (PaginationStyle::NextPageField { field }, Some(next)) => {
            format!("{}{}{}={}", path, separator, field, encode_query_value(next))
        }
        (PaginationStyle::StartParameter { .. }, None) => {
            format!("{}{}limit={}", path, separator, PAGE_SIZE)
        }
        (PaginationStyle::StartParameter { .. }, Some(start)) => format!(
            "{}{}start={}&limit={}",
            path,
            separator,
            encode_query_value(start),
            PAGE_SIZE
        ),
    }
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Target of the `rel="next"` entry of a `Link` header
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| {
            let (target, params) = entry.split_once(';')?;
            let is_next = params.split(';').any(|param| {
                let param = param.trim().replace(' ', "");
                param == "rel=\"next\"" || param == "rel=next"
            });
            let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
            is_next.then(|| target.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn access(base: &str) -> HttpAccess {
        HttpAccess::new(base, AuthMode::Anonymous, false, Logger::new_quiet()).unwrap()
    }

    #[test]
    fn test_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("</v2/_catalog?last=b&n=100>; rel=\"next\""),
        );
        assert_eq!(next_link(&headers).as_deref(), Some("/v2/_catalog?last=b&n=100"));

        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "</v2/x?page=1>; rel=\"prev\", </v2/x?page=3>; rel=\"next\"",
            ),
        );
        assert_eq!(next_link(&headers).as_deref(), Some("/v2/x?page=3"));

        assert_eq!(next_link(&HeaderMap::new()), None);
    }

    #[test]
    fn test_page_paths() {
        assert_eq!(
            page_path("v2/_catalog", &PaginationStyle::LinkHeader, None),
            "v2/_catalog?n=100"
        );
        assert_eq!(
            page_path(
                "v2/_catalog",
                &PaginationStyle::LinkHeader,
                Some("https://r.example.com/v2/_catalog?last=b&n=100")
            ),
            "https://r.example.com/v2/_catalog?last=b&n=100"
        );
        assert_eq!(
            page_path(
                "api/v1/repository?namespace=acme",
                &PaginationStyle::NextPageField { field: "next_page" },
                Some("abc=")
            ),
            "api/v1/repository?namespace=acme&next_page=abc%3D"
        );
        assert_eq!(
            page_path(
                "accounts/",
                &PaginationStyle::StartParameter {
                    field: "nextPageStart",
                    item_key: "name",
                },
                Some("team b")
            ),
            "accounts/?start=team+b&limit=100"
        );
    }

    #[test]
    fn test_url_resolution() {
        let http = access("https://art.example.com/artifactory");
        assert_eq!(
            http.url("api/system/ping").unwrap(),
            "https://art.example.com/artifactory/api/system/ping"
        );
        assert_eq!(
            http.url("/api/system/ping").unwrap(),
            "https://art.example.com/artifactory/api/system/ping"
        );
        assert_eq!(
            http.resolve_reference("/artifactory/api/docker/r/v2/_catalog?last=a").unwrap(),
            "https://art.example.com/artifactory/api/docker/r/v2/_catalog?last=a"
        );
    }

    #[test]
    fn test_url_for_segments_encodes() {
        let http = access("https://ucp.example.com/enzi/v0");
        assert_eq!(
            http.url_for_segments(&["accounts", "my org", "teams", ""]).unwrap(),
            "https://ucp.example.com/enzi/v0/accounts/my%20org/teams/"
        );
    }

    #[test]
    fn test_extract_field() {
        let item = json!({"member": {"name": "alice", "id": 7}, "isOrg": true});
        assert_eq!(extract_string(&item, "member.name").as_deref(), Some("alice"));
        assert_eq!(extract_string(&item, "member.id").as_deref(), Some("7"));
        assert_eq!(extract_field(&item, "isOrg"), Some(&json!(true)));
        assert_eq!(extract_field(&item, "member.missing"), None);
    }

    #[test]
    fn test_next_start() {
        let full: Vec<Value> = (0..PAGE_SIZE)
            .map(|i| json!({"member": {"id": i, "name": format!("user{}", i)}}))
            .collect();

        // The service-provided start wins
        let body = json!({"members": [], "nextPageStart": "user42"});
        assert_eq!(
            next_start(&body, &full, "nextPageStart", "member.id").as_deref(),
            Some("user42")
        );

        // An empty start marks the last page even when it is full
        let body = json!({"nextPageStart": ""});
        assert_eq!(next_start(&body, &full, "nextPageStart", "member.id"), None);

        // Without the field a full page continues after its last item
        let body = json!({"members": []});
        assert_eq!(
            next_start(&body, &full, "nextPageStart", "member.id").as_deref(),
            Some("99")
        );

        // and a short page is the last one
        assert_eq!(
            next_start(&body, &full[..3], "nextPageStart", "member.id"),
            None
        );
    }
}
