//! Stateful REST client for the user-management service

use std::time::Instant;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::endpoints;
use super::response::ApiResponse;
use crate::config::HarnessSettings;
use crate::error::E2eResult;
use crate::model::User;

/// How a request presents the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// No Authorization header
    Anonymous,
    /// Always send `Bearer <token>`, rendering a missing token as `null`
    Bearer,
    /// Send the header only when a token is held
    IfPresent,
}

/// REST client holding the current bearer token.
///
/// The token is plain state: cases flip it to `None` or a bogus value to
/// exercise the auth paths and restore it afterwards.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &HarnessSettings) -> E2eResult<Self> {
        Self::with_base_url(settings.backend_url(), settings)
    }

    /// Client for an explicit base URL, taking transport options from `settings`
    pub fn with_base_url(base_url: impl Into<String>, settings: &HarnessSettings) -> E2eResult<Self> {
        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(true);
        if let Some(timeout) = settings.http_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Log in and cache the token on 200. Returns `None` on any other status.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> E2eResult<Option<String>> {
        let response = self.login(username, password).await?;
        if response.status() != 200 {
            debug!("Authentication as '{}' returned {}", username, response.status());
            return Ok(None);
        }

        let token = response.json_path("token");
        if token.is_some() {
            self.token = token.clone();
        }
        Ok(token)
    }

    /// Raw login call; does not touch the cached token
    pub async fn login(&self, username: &str, password: &str) -> E2eResult<ApiResponse> {
        let body = json!({ "username": username, "password": password });
        let request = self.request(Method::POST, endpoints::LOGIN, Auth::Anonymous).json(&body);
        self.execute(request).await
    }

    pub async fn logout(&self) -> E2eResult<ApiResponse> {
        let request = self.request(Method::POST, endpoints::LOGOUT, Auth::IfPresent);
        self.execute(request).await
    }

    pub async fn verify_token(&self) -> E2eResult<ApiResponse> {
        let request = self.request(Method::GET, endpoints::VERIFY_TOKEN, Auth::Bearer);
        self.execute(request).await
    }

    /// List users, decoding the array
    pub async fn list_users(&self) -> E2eResult<Vec<User>> {
        self.list_users_response().await?.as_users()
    }

    pub async fn list_users_response(&self) -> E2eResult<ApiResponse> {
        let request = self.request(Method::GET, endpoints::USERS, Auth::Bearer);
        self.execute(request).await
    }

    pub async fn get_user(&self, id: &str) -> E2eResult<ApiResponse> {
        let request = self.request(Method::GET, &endpoints::user_path(id), Auth::Bearer);
        self.execute(request).await
    }

    /// Create from a [`User`] or any free-form JSON map
    pub async fn create_user<B: Serialize + ?Sized>(&self, body: &B) -> E2eResult<ApiResponse> {
        let request = self.request(Method::POST, endpoints::USERS, Auth::Bearer).json(body);
        self.execute(request).await
    }

    pub async fn update_user<B: Serialize + ?Sized>(&self, id: &str, body: &B) -> E2eResult<ApiResponse> {
        let request = self
            .request(Method::PUT, &endpoints::user_path(id), Auth::Bearer)
            .json(body);
        self.execute(request).await
    }

    /// Partial update. The service has no PATCH route, so this is a PUT
    /// carrying whatever fields the caller supplies.
    pub async fn patch_user<B: Serialize + ?Sized>(&self, id: &str, body: &B) -> E2eResult<ApiResponse> {
        self.update_user(id, body).await
    }

    pub async fn delete_user(&self, id: &str) -> E2eResult<ApiResponse> {
        let request = self.request(Method::DELETE, &endpoints::user_path(id), Auth::Bearer);
        self.execute(request).await
    }

    pub async fn health_check(&self) -> E2eResult<ApiResponse> {
        let request = self.request(Method::GET, endpoints::HEALTH_CHECK, Auth::Anonymous);
        self.execute(request).await
    }

    fn request(&self, method: Method, path: &str, auth: Auth) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");

        match (auth, self.token.as_deref()) {
            (Auth::Anonymous, _) | (Auth::IfPresent, None) => {}
            (Auth::Bearer, None) => {
                builder = builder.header(AUTHORIZATION, "Bearer null");
            }
            (_, Some(token)) => {
                builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
            }
        }
        builder
    }

    async fn execute(&self, builder: RequestBuilder) -> E2eResult<ApiResponse> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let start = Instant::now();
        let response = self.http.execute(request).await?;
        let elapsed = start.elapsed();

        debug!(
            "{} {} -> {} ({} ms)",
            method,
            path,
            response.status().as_u16(),
            elapsed.as_millis()
        );
        ApiResponse::read(response, elapsed).await
    }
}
