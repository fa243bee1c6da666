//! GitLab API client.
//!
//! Read-only HTTP client for GitLab API v4 with token authentication and
//! pagination. Calls are never retried; a failure is classified and returned.

use std::future::Future;

use crate::error::AppError;
use crate::models::merge_request::MergeRequest;
use crate::models::project::Project;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Page size requested from paginated endpoints (GitLab's maximum).
const PER_PAGE: u32 = 100;

/// Read operations the watchdog needs from a source-control host.
pub trait SourceControl {
    /// List every project under a group.
    fn group_projects(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<Project>, AppError>> + Send;

    /// Find the ID of `project_name` among the projects of account `username`.
    fn individual_project_id(
        &self,
        username: &str,
        project_name: &str,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;

    /// List all open merge requests of a project.
    fn open_merge_requests(
        &self,
        project_id: i64,
    ) -> impl Future<Output = Result<Vec<MergeRequest>, AppError>> + Send;
}

/// GitLab API client configuration.
#[derive(Debug, Clone)]
pub struct GitLabClientConfig {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// GitLab API client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    config: GitLabClientConfig,
}

/// Query parameters for listing merge requests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeRequestsQuery {
    /// Filter by state: `opened`, `merged`, `closed`, `all`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl MergeRequestsQuery {
    pub fn opened() -> Self {
        Self {
            state: Some("opened".to_string()),
        }
    }
}

/// GitLab user from the `/users?username=` lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub id: i64,
    pub username: String,
}

impl GitLabClient {
    /// Create a new GitLab client.
    pub fn new(config: GitLabClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        let token_value = header::HeaderValue::from_str(&config.token)
            .map_err(|_| AppError::config_field("Invalid token format", "gitlab.token"))?;
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL for API requests.
    fn api_url(&self, path: &str) -> String {
        api_url(&self.config.base_url, path)
    }

    /// Classify a response: 404 becomes `NotFound`, any other failure keeps the
    /// raw body.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(AppError::not_found(endpoint))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::gitlab_api_full(body, status.as_u16(), endpoint))
        }
    }

    /// Make a single GET request.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&impl Serialize>,
    ) -> Result<T, AppError> {
        let mut request = self.client.get(self.api_url(endpoint));
        if let Some(q) = query {
            request = request.query(q);
        }

        let response = request.send().await?;
        self.handle_response(response, endpoint).await
    }

    /// Fetch all pages of a paginated endpoint.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&impl Serialize>,
    ) -> Result<Vec<T>, AppError> {
        let mut all_data = Vec::new();
        let mut page = 1u32;

        loop {
            let mut request = self.client.get(self.api_url(endpoint));

            if let Some(q) = query {
                request = request.query(q);
            }

            request = request.query(&[("page", page), ("per_page", PER_PAGE)]);

            let response = request.send().await?;
            let next_page = next_page(&response);
            let data = self.handle_response::<Vec<T>>(response, endpoint).await?;

            all_data.extend(data);

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(all_data)
    }

    /// Resolve a username to its account ID.
    ///
    /// Only accounts whose username equals `username` exactly count; fails
    /// with `AmbiguousOwner` unless there is exactly one.
    pub async fn find_user_id(&self, username: &str) -> Result<i64, AppError> {
        let users: Vec<GitLabUser> = match self.get("/users", Some(&[("username", username)])).await
        {
            Ok(users) => users,
            Err(AppError::NotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        let matching: Vec<&GitLabUser> =
            users.iter().filter(|user| user.username == username).collect();

        match matching.as_slice() {
            [user] => Ok(user.id),
            _ => Err(AppError::ambiguous_owner(username, matching.len())),
        }
    }

    /// Search the projects owned by an account.
    pub async fn search_user_projects(
        &self,
        user_id: i64,
        search: &str,
    ) -> Result<Vec<Project>, AppError> {
        let endpoint = format!("/users/{}/projects", user_id);
        self.get_all_pages(&endpoint, Some(&[("search", search)]))
            .await
    }
}

impl SourceControl for GitLabClient {
    async fn group_projects(&self, group: &str) -> Result<Vec<Project>, AppError> {
        let endpoint = format!("/groups/{}/projects", urlencoding::encode(group));
        self.get_all_pages(&endpoint, None::<&()>).await
    }

    async fn individual_project_id(
        &self,
        username: &str,
        project_name: &str,
    ) -> Result<i64, AppError> {
        let user_id = self.find_user_id(username).await?;
        let projects = self.search_user_projects(user_id, project_name).await?;

        first_exact_match(&projects, project_name)
            .map(|project| project.id)
            .ok_or_else(|| AppError::not_found_with_id("project", project_name))
    }

    async fn open_merge_requests(&self, project_id: i64) -> Result<Vec<MergeRequest>, AppError> {
        let endpoint = format!("/projects/{}/merge_requests", project_id);
        self.get_all_pages(&endpoint, Some(&MergeRequestsQuery::opened()))
            .await
    }
}

/// First project whose name equals `name` exactly (case-sensitive).
pub fn first_exact_match<'a>(projects: &'a [Project], name: &str) -> Option<&'a Project> {
    projects.iter().find(|project| project.name == name)
}

fn api_url(base_url: &str, path: &str) -> String {
    format!("{}/api/v4{}", base_url.trim_end_matches('/'), path)
}

/// Next page number from GitLab's `x-next-page` header; empty on the last page.
fn next_page(response: &Response) -> Option<u32> {
    response
        .headers()
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
