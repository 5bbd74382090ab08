//! Captured HTTP responses

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::E2eResult;
use crate::model::User;

/// A fully read response. Non-2xx statuses are ordinary values here.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl ApiResponse {
    pub(crate) async fn read(response: reqwest::Response, elapsed: Duration) -> E2eResult<Self> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(Self {
            status,
            headers,
            body,
            elapsed,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(reqwest::header::CONTENT_TYPE.as_str())
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    pub fn json(&self) -> E2eResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn parse<T: DeserializeOwned>(&self) -> E2eResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Dotted lookup such as `user.username` or `0.id`.
    ///
    /// Strings are returned without quotes; other values in their JSON
    /// rendering. Missing paths, null values and non-JSON bodies give `None`.
    pub fn json_path(&self, path: &str) -> Option<String> {
        let root: Value = serde_json::from_str(&self.body).ok()?;
        let node = path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&root, |node, segment| match node {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => node.get(segment),
            })?;

        match node {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn body_contains(&self, needle: &str) -> bool {
        self.body.contains(needle)
    }

    pub fn as_user(&self) -> E2eResult<User> {
        self.parse()
    }

    pub fn as_users(&self) -> E2eResult<Vec<User>> {
        self.parse()
    }
}
