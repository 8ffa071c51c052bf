//! Registry API client.
//!
//! Provides an HTTP client for the registry's `/api/v1` with bearer
//! authentication, CSRF handling for mutating requests and page walking.

use crate::config::ConsoleConfig;
use crate::error::AppError;
use crate::models::{
    Build, BuildList, Manifest, NotificationList, Organization, Repository, RepositoryPage, Robot,
    RobotList, Tag, TagsPage,
};
use crate::services::confirmation::confirm_destructive;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Header carrying the CSRF token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Largest page the tag endpoint accepts.
pub const MAX_TAGS_PER_PAGE: u32 = 100;

/// Registry client configuration.
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// Base URL of the registry (e.g., `https://quay.example.com`).
    pub base_url: String,

    /// OAuth/application token sent as a bearer token.
    pub token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl RegistryClientConfig {
    pub fn from_console(config: &ConsoleConfig) -> Result<Self, AppError> {
        Ok(Self {
            base_url: config.api_base_url()?,
            token: config.console.token.clone(),
            timeout_secs: config.console.timeout_secs,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CsrfTokenResponse {
    csrf_token: String,
}

/// Registry API client.
///
/// Cheap to clone; clones share the cached CSRF token.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    config: RegistryClientConfig,
    csrf_token: Arc<RwLock<Option<String>>>,
}

impl RegistryClient {
    /// Create a new registry client.
    pub fn new(config: RegistryClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| AppError::authentication("Invalid token format"))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            csrf_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Build a full `/api/v1` URL.
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url(), path)
    }

    // ------------------------------------------------------------------
    // Response handling
    // ------------------------------------------------------------------

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let response = Self::check_status(response, endpoint).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
    }

    /// Pass successful responses through; turn anything else into an error.
    async fn check_status(response: Response, endpoint: &str) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_error(status, &body, endpoint))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        log::debug!("[registry] GET {}", endpoint);
        let response = self
            .client
            .get(self.api_url(endpoint))
            .query(query)
            .send()
            .await?;

        self.handle_response(response, endpoint).await
    }

    // ------------------------------------------------------------------
    // CSRF
    // ------------------------------------------------------------------

    /// Fetch a fresh CSRF token and cache it.
    pub async fn fetch_csrf_token(&self) -> Result<String, AppError> {
        let url = format!("{}/csrf_token", self.base_url());
        let response = self.client.get(url).send().await?;

        let body: CsrfTokenResponse = match Self::check_status(response, "/csrf_token").await {
            Ok(response) => response
                .json()
                .await
                .map_err(|e| AppError::csrf(format!("Malformed CSRF token response: {}", e)))?,
            Err(err @ AppError::Authentication { .. }) => return Err(err),
            Err(err) => return Err(AppError::csrf(format!("Could not fetch CSRF token: {}", err))),
        };

        *self.csrf_token.write().await = Some(body.csrf_token.clone());
        log::debug!("[registry] Fetched CSRF token");
        Ok(body.csrf_token)
    }

    /// Cached CSRF token, fetching one on first use.
    async fn csrf_token(&self) -> Result<String, AppError> {
        if let Some(token) = self.csrf_token.read().await.clone() {
            return Ok(token);
        }
        self.fetch_csrf_token().await
    }

    async fn clear_csrf_token(&self) {
        *self.csrf_token.write().await = None;
    }

    /// Send a mutating request with the CSRF header.
    ///
    /// A 403 that mentions CSRF drops the cached token, refetches it and
    /// retries exactly once.
    async fn send_mutating(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, AppError> {
        let mut refreshed = false;

        loop {
            let token = self.csrf_token().await?;
            log::debug!("[registry] {} {}", method, endpoint);

            let mut request = self
                .client
                .request(method.clone(), self.api_url(endpoint))
                .header(CSRF_HEADER, token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            if response.status() != StatusCode::FORBIDDEN {
                return Self::check_status(response, endpoint).await;
            }

            let text = response.text().await.unwrap_or_default();
            if !is_csrf_rejection(&text) {
                return Err(map_error(StatusCode::FORBIDDEN, &text, endpoint));
            }

            if refreshed {
                return Err(AppError::csrf(format!(
                    "CSRF token rejected by {} after refresh",
                    endpoint
                )));
            }

            log::warn!("[registry] CSRF token rejected by {}, refreshing", endpoint);
            self.clear_csrf_token().await;
            refreshed = true;
        }
    }

    // ------------------------------------------------------------------
    // Organizations and repositories
    // ------------------------------------------------------------------

    pub async fn get_organization(&self, org: &str) -> Result<Organization, AppError> {
        let endpoint = format!("/organization/{}", urlencoding::encode(org));
        self.get_json(&endpoint, &[]).await
    }

    /// All repositories of a namespace, following `next_page` tokens.
    pub async fn list_repositories(&self, namespace: &str) -> Result<Vec<Repository>, AppError> {
        let mut repositories = Vec::new();
        let mut next_page: Option<String> = None;

        loop {
            let mut query = vec![
                ("namespace", namespace.to_string()),
                ("last_modified", "true".to_string()),
                ("public", "true".to_string()),
            ];
            if let Some(token) = next_page.take() {
                query.push(("next_page", token));
            }

            let page: RepositoryPage = self.get_json("/repository", &query).await?;
            repositories.extend(page.repositories);

            match page.next_page {
                Some(token) if !token.is_empty() => next_page = Some(token),
                _ => break,
            }
        }

        log::debug!(
            "[registry] {} repositories in '{}'",
            repositories.len(),
            namespace
        );
        Ok(repositories)
    }

    /// Delete a repository. `confirmation` must be the typed `namespace/name`.
    pub async fn delete_repository(
        &self,
        namespace: &str,
        name: &str,
        confirmation: &str,
    ) -> Result<(), AppError> {
        confirm_destructive(&format!("{}/{}", namespace, name), confirmation)?;

        let endpoint = repo_path(namespace, name);
        self.send_mutating(Method::DELETE, &endpoint, None).await?;
        log::info!("[registry] Deleted repository {}/{}", namespace, name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tags and manifests
    // ------------------------------------------------------------------

    /// One page of tags (1-based). `limit` is capped at [`MAX_TAGS_PER_PAGE`].
    pub async fn list_tags_page(
        &self,
        namespace: &str,
        repo: &str,
        page: u32,
        limit: u32,
        only_active: bool,
    ) -> Result<TagsPage, AppError> {
        if page == 0 {
            return Err(AppError::invalid_input_field("Pages start at 1", "page"));
        }

        let endpoint = format!("{}/tag/", repo_path(namespace, repo));
        let query = [
            ("limit", limit.clamp(1, MAX_TAGS_PER_PAGE).to_string()),
            ("page", page.to_string()),
            ("onlyActiveTags", only_active.to_string()),
        ];
        self.get_json(&endpoint, &query).await
    }

    /// Every active tag of a repository.
    pub async fn list_all_tags(&self, namespace: &str, repo: &str) -> Result<Vec<Tag>, AppError> {
        let mut tags = Vec::new();
        let mut page = 1;

        loop {
            let batch = self
                .list_tags_page(namespace, repo, page, MAX_TAGS_PER_PAGE, true)
                .await?;
            tags.extend(batch.tags);

            if !batch.has_additional {
                break;
            }
            page += 1;
        }

        Ok(tags)
    }

    pub async fn get_manifest(
        &self,
        namespace: &str,
        repo: &str,
        digest: &str,
    ) -> Result<Manifest, AppError> {
        let endpoint = format!(
            "{}/manifest/{}",
            repo_path(namespace, repo),
            urlencoding::encode(digest)
        );
        self.get_json(&endpoint, &[]).await
    }

    pub async fn delete_tag(&self, namespace: &str, repo: &str, tag: &str) -> Result<(), AppError> {
        let endpoint = format!(
            "{}/tag/{}",
            repo_path(namespace, repo),
            urlencoding::encode(tag)
        );
        self.send_mutating(Method::DELETE, &endpoint, None).await?;
        log::info!("[registry] Deleted tag {}/{}:{}", namespace, repo, tag);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Robot accounts
    // ------------------------------------------------------------------

    /// Robots of an organization, or of the current user when `is_user`.
    pub async fn list_robots(&self, namespace: &str, is_user: bool) -> Result<Vec<Robot>, AppError> {
        let endpoint = format!("{}/robots", robots_owner_path(namespace, is_user));
        let query = [
            ("permissions", "true".to_string()),
            ("token", "false".to_string()),
        ];
        let list: RobotList = self.get_json(&endpoint, &query).await?;
        Ok(list.robots)
    }

    /// Delete a robot account.
    ///
    /// `robot` may be the full `namespace+short` name or the short name.
    /// Organization robots require `confirmation` to equal the full name.
    pub async fn delete_robot(
        &self,
        namespace: &str,
        robot: &str,
        is_user: bool,
        confirmation: &str,
    ) -> Result<(), AppError> {
        let prefix = format!("{}+", namespace);
        let short = robot.strip_prefix(&prefix).unwrap_or(robot);

        if !is_user {
            confirm_destructive(&format!("{}{}", prefix, short), confirmation)?;
        }

        let endpoint = format!(
            "{}/robots/{}",
            robots_owner_path(namespace, is_user),
            urlencoding::encode(short)
        );
        self.send_mutating(Method::DELETE, &endpoint, None).await?;
        log::info!("[registry] Deleted robot {}{}", prefix, short);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notifications and builds
    // ------------------------------------------------------------------

    pub async fn list_notifications(&self) -> Result<NotificationList, AppError> {
        self.get_json("/user/notifications", &[]).await
    }

    /// Mark a notification of the current user as dismissed.
    pub async fn dismiss_notification(&self, uuid: &str) -> Result<(), AppError> {
        let endpoint = format!("/user/notifications/{}", urlencoding::encode(uuid));
        let body = serde_json::json!({ "dismissed": true });
        self.send_mutating(Method::PUT, &endpoint, Some(&body)).await?;
        log::info!("[registry] Dismissed notification {}", uuid);
        Ok(())
    }

    /// Most recent builds of a repository.
    pub async fn list_builds(
        &self,
        namespace: &str,
        repo: &str,
        limit: u32,
    ) -> Result<Vec<Build>, AppError> {
        let endpoint = format!("{}/build/", repo_path(namespace, repo));
        let list: BuildList = self
            .get_json(&endpoint, &[("limit", limit.to_string())])
            .await?;
        Ok(list.builds)
    }

    pub async fn get_build(
        &self,
        namespace: &str,
        repo: &str,
        build_id: &str,
    ) -> Result<Build, AppError> {
        let endpoint = format!(
            "{}/build/{}",
            repo_path(namespace, repo),
            urlencoding::encode(build_id)
        );
        self.get_json(&endpoint, &[]).await
    }
}

fn repo_path(namespace: &str, repo: &str) -> String {
    format!(
        "/repository/{}/{}",
        urlencoding::encode(namespace),
        urlencoding::encode(repo)
    )
}

fn robots_owner_path(namespace: &str, is_user: bool) -> String {
    if is_user {
        "/user".to_string()
    } else {
        format!("/organization/{}", urlencoding::encode(namespace))
    }
}

/// True when a 403 body is the registry complaining about the CSRF token.
fn is_csrf_rejection(body: &str) -> bool {
    body.to_ascii_lowercase().contains("csrf")
}

/// Map a non-2xx response to an [`AppError`].
fn map_error(status: StatusCode, body: &str, endpoint: &str) -> AppError {
    if status == StatusCode::UNAUTHORIZED {
        return AppError::authentication("Registry token expired or revoked. Please sign in again.");
    }

    if status == StatusCode::NOT_FOUND {
        return AppError::not_found(endpoint);
    }

    // The registry reports errors as {"error_message": ...}, {"message": ...}
    // or {"error": ...}, sometimes alongside {"detail": ...}
    let body_message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error_message", "message", "error", "detail"]
                .iter()
                .find_map(|key| v.get(*key).filter(|m| !m.is_null()).cloned())
        })
        .map(|m| match m.as_str() {
            Some(s) => s.to_string(),
            None => m.to_string(),
        });

    let message = match (status, body_message) {
        (_, Some(msg)) => msg,
        (StatusCode::FORBIDDEN, None) => "Access denied".to_string(),
        (StatusCode::TOO_MANY_REQUESTS, None) => "Rate limit exceeded".to_string(),
        _ => format!("Request failed ({}): {}", status.as_u16(), body),
    };

    AppError::registry_api_full(message, status.as_u16(), endpoint)
}
