//! Reading users: list, by id, auth and response shape

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{reapply_token, release, ApiState};
use crate::error::E2eResult;
use crate::suite::{Case, CaseParams, HarnessContext, Suite};
use crate::verify;

const LIST_BUDGET_MS: u128 = 5000;

pub fn suite() -> Suite<ApiState> {
    Suite::new("get_user", setup)
        .tag("api")
        .before_each(reapply_token)
        .after_all(release)
        .case(Case::new("list_users", list_users).priority(1))
        .case(Case::new("get_user_by_id", get_user_by_id).priority(2))
        .case(Case::new("get_user_invalid_id", invalid_id).priority(3))
        .case(Case::new("get_user_non_existent_id", non_existent_id).priority(4))
        .case(Case::new("list_users_without_auth", list_without_auth).priority(5))
        .case(Case::new("get_user_without_auth", get_without_auth).priority(6))
        .case(Case::new("list_users_response_time", response_time).priority(7))
        .case(Case::new("list_users_content_type", content_type).priority(8))
        .case(Case::new("user_data_structure", data_structure).priority(9))
}

/// Authenticate and create the user the cases read back
fn setup<'a>(ctx: &'a HarnessContext) -> BoxFuture<'a, E2eResult<ApiState>> {
    async move {
        let mut state = ApiState::authenticated(ctx).await?;
        let user = state.valid_user(0)?;
        let created = state.create_tracked(&user).await?;
        state.user_id = created.id;
        Ok(state)
    }
    .boxed()
}

fn list_users<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.list_users_response().await?;
        verify::equals(response.status(), 200, "Expected status code 200 for listing users")?;
        verify::is_true(response.text().trim_start().starts_with('['), "Response should be an array")?;

        let users = response.as_users()?;
        verify::is_false(users.is_empty(), "User list should contain at least one user")
    }
    .boxed()
}

fn get_user_by_id<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let response = s.api.get_user(&id).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for get user by id")?;

        let user = response.as_user()?;
        verify::equals(user.id.as_deref(), Some(id.as_str()), "User ID should match")?;
        verify::is_some(&user.name, "Name should not be null")?;
        verify::is_some(&user.email, "Email should not be null")?;
        verify::is_some(&user.created_at, "CreatedAt should not be null")?;
        verify::is_some(&user.updated_at, "UpdatedAt should not be null")
    }
    .boxed()
}

fn invalid_id<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.get_user("invalid-user-id-23").await?;
        verify::equals(response.status(), 404, "Expected status code 404 for invalid user id")?;
        verify::contains(response.text(), "User not found", "Response should contain 'User not found'")
    }
    .boxed()
}

fn non_existent_id<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.get_user("999999999999999999").await?;
        verify::equals(response.status(), 404, "Expected status code 404 for non-existent user")
    }
    .boxed()
}

fn list_without_auth<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.api.set_token(None);
        let response = s.api.list_users_response().await;
        s.restore_token();

        verify::equals(response?.status(), 403, "Expected status code 403 without authentication")
    }
    .boxed()
}

fn get_without_auth<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        s.api.set_token(None);
        let response = s.api.get_user(&id).await;
        s.restore_token();

        verify::equals(response?.status(), 403, "Expected status code 403 without authentication")
    }
    .boxed()
}

fn response_time<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.list_users_response().await?;
        verify::equals(response.status(), 200, "Expected status code 200 for listing users")?;
        verify::less_than(response.elapsed_ms(), LIST_BUDGET_MS, "Listing users should take under 5000 ms")
    }
    .boxed()
}

fn content_type<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.list_users_response().await?;
        verify::contains(
            response.content_type().unwrap_or_default(),
            "application/json",
            "Content-Type should be JSON",
        )
    }
    .boxed()
}

fn data_structure<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let user = s.api.get_user(&id).await?.as_user()?;

        verify::is_false(user.id().unwrap_or_default().is_empty(), "ID should not be empty")?;
        verify::contains(user.email.as_deref().unwrap_or_default(), "@", "Email should contain @")
    }
    .boxed()
}
