//! The concrete API and UI suites
//!
//! API suites share [`ApiState`]: one client, the suite token and the ids of
//! every user the suite created, deleted again in `after_all`.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::FixtureStore;
use crate::model::User;
use crate::runner::TestRunner;
use crate::suite::{HarnessContext, SuiteState};
use crate::verify;

pub mod authentication;
pub mod create_user;
pub mod delete_user;
pub mod get_user;
pub mod patch_user;
pub mod put_user;
pub mod ui;

/// Register every suite that only needs the REST backend
pub fn register_api_suites(runner: &mut TestRunner) {
    runner
        .register(authentication::suite())
        .register(get_user::suite())
        .register(create_user::suite())
        .register(put_user::suite())
        .register(patch_user::suite())
        .register(delete_user::suite());
}

/// API suites followed by the browser suite
pub fn register_all(runner: &mut TestRunner) {
    register_api_suites(runner);
    runner.register(ui::suite());
}

/// State shared by the cases of an API suite
pub struct ApiState {
    pub api: ApiClient,
    pub fixtures: Arc<FixtureStore>,
    /// Token obtained in `before_all`, re-applied before every case
    pub token: Option<String>,
    /// The user a suite works on, if it keeps one
    pub user_id: Option<String>,
    created: Vec<String>,
}

impl SuiteState for ApiState {}

impl ApiState {
    /// Client without a session
    pub fn anonymous(ctx: &HarnessContext) -> E2eResult<Self> {
        Ok(Self {
            api: ApiClient::new(&ctx.settings)?,
            fixtures: Arc::clone(&ctx.fixtures),
            token: None,
            user_id: None,
            created: Vec::new(),
        })
    }

    /// Client logged in with the configured account
    pub async fn authenticated(ctx: &HarnessContext) -> E2eResult<Self> {
        let mut state = Self::anonymous(ctx)?;
        let token = state
            .api
            .authenticate(&ctx.settings.auth_username, &ctx.settings.auth_password)
            .await?;
        verify::is_some(&token, "Authentication failed")?;
        state.token = token;
        Ok(state)
    }

    pub fn restore_token(&mut self) {
        self.api.set_token(self.token.clone());
    }

    /// Id of the suite's working user
    pub fn user_id(&self) -> E2eResult<String> {
        self.user_id
            .clone()
            .ok_or_else(|| E2eError::Config("no test user was created for this suite".into()))
    }

    /// Valid user at `index` of the fixture list
    pub fn valid_user(&self, index: usize) -> E2eResult<User> {
        self.fixtures
            .valid_users()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| E2eError::fixture("validUsers", format!("no user at index {}", index)))
    }

    /// Create `user` and expect 201. Leftovers with the same email from an
    /// earlier aborted run are removed first. The new id is tracked for cleanup.
    pub async fn create_tracked(&mut self, user: &User) -> E2eResult<User> {
        self.remove_by_email(user.email.as_deref()).await?;

        let response = self.api.create_user(&user.payload()).await?;
        verify::equals(response.status(), 201, "Failed to create test user")?;
        let created = response.as_user()?;
        let id = created.id().map(String::from);
        verify::is_some(&id, "Test user ID should not be null")?;
        self.created.extend(id);
        Ok(created)
    }

    async fn remove_by_email(&mut self, email: Option<&str>) -> E2eResult<()> {
        let Some(email) = email else {
            return Ok(());
        };
        let response = self.api.list_users_response().await?;
        if response.status() != 200 {
            return Ok(());
        }
        for stale in response.as_users()? {
            if stale.email.as_deref() != Some(email) {
                continue;
            }
            if let Some(id) = stale.id() {
                warn!("Removing leftover user {} ({})", id, email);
                self.api.delete_user(id).await?;
            }
        }
        Ok(())
    }

    /// Delete every tracked user. Already-deleted ids are fine.
    pub async fn cleanup(&mut self) {
        self.restore_token();
        for id in std::mem::take(&mut self.created) {
            match self.api.delete_user(&id).await {
                Ok(response) if response.status() == 200 => debug!("Cleaned up user {}", id),
                Ok(response) => debug!("User {} already gone ({})", id, response.status()),
                Err(e) => warn!("Cleanup of user {} failed: {}", id, e),
            }
        }
        self.user_id = None;
    }
}

pub(crate) fn connect<'a>(ctx: &'a HarnessContext) -> BoxFuture<'a, E2eResult<ApiState>> {
    ApiState::authenticated(ctx).boxed()
}

pub(crate) fn reapply_token<'a>(state: &'a mut ApiState) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        state.restore_token();
        Ok(())
    }
    .boxed()
}

pub(crate) fn release(mut state: ApiState) -> BoxFuture<'static, E2eResult<()>> {
    async move {
        state.cleanup().await;
        Ok(())
    }
    .boxed()
}

/// One single-value tuple per item
pub(crate) fn rows<T: Serialize>(items: Vec<T>) -> E2eResult<Vec<Vec<Value>>> {
    items
        .iter()
        .map(|item| -> E2eResult<Vec<Value>> { Ok(vec![serde_json::to_value(item)?]) })
        .collect()
}

pub(crate) fn invalid_users(ctx: &HarnessContext) -> E2eResult<Vec<Vec<Value>>> {
    rows(ctx.fixtures.invalid_users()?)
}
