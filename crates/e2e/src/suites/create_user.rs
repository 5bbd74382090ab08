//! Creating users: echo, round trip, validation and auth

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{connect, invalid_users, reapply_token, release, ApiState};
use crate::error::E2eResult;
use crate::model::User;
use crate::suite::{Case, CaseParams, Suite};
use crate::verify;

pub fn suite() -> Suite<ApiState> {
    Suite::new("create_user", connect)
        .tag("api")
        .before_each(reapply_token)
        .after_all(release)
        .provider("invalidUsers", invalid_users)
        .case(Case::new("create_valid_user", create_valid_user).priority(1))
        .case(Case::new("create_then_get", create_then_get).priority(2))
        .case(
            Case::new("create_then_delete", create_then_delete)
                .priority(3)
                .describe("login, create sowmya, delete, expect 404"),
        )
        .case(Case::new("create_duplicate_email", duplicate_email).priority(4))
        .case(Case::new("create_invalid_user", invalid_user).priority(5).data("invalidUsers"))
        .case(Case::new("create_without_auth", without_auth).priority(6))
        .case(Case::new("create_without_age", without_age).priority(7))
}

fn create_valid_user<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let input = s.valid_user(0)?;
        let created = s.create_tracked(&input).await?;

        verify::equals(created.name.as_deref(), input.name.as_deref(), "Name should be echoed")?;
        verify::equals(created.email.as_deref(), input.email.as_deref(), "Email should be echoed")?;
        verify::is_false(created.id().unwrap_or_default().is_empty(), "ID should not be empty")?;
        verify::is_some(&created.created_at, "CreatedAt should not be null")?;
        verify::is_some(&created.updated_at, "UpdatedAt should not be null")
    }
    .boxed()
}

fn create_then_get<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let input = s.valid_user(1)?;
        let created = s.create_tracked(&input).await?;
        let id = created.id().unwrap_or_default();

        let response = s.api.get_user(id).await?;
        verify::equals(response.status(), 200, "Created user should be retrievable")?;
        let fetched = response.as_user()?;
        verify::is_true(
            input.same_identity(&fetched),
            "Fetched user should match the created name, email and age",
        )
    }
    .boxed()
}

fn create_then_delete<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let input = User::new("sowmya", "sowmya@abc.com").with_age(30);
        let created = s.create_tracked(&input).await?;
        let id = created.id().unwrap_or_default();

        let deleted = s.api.delete_user(id).await?;
        verify::equals(deleted.status(), 200, "Expected status code 200 for user deletion")?;
        verify::contains(deleted.text(), "User deleted successfully", "Deletion message")?;
        verify::contains(deleted.text(), "sowmya", "Deleted user should be echoed")?;

        let response = s.api.get_user(id).await?;
        verify::equals(response.status(), 404, "Deleted user should no longer exist")
    }
    .boxed()
}

fn duplicate_email<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let input = s.valid_user(2)?;
        s.create_tracked(&input).await?;

        let response = s.api.create_user(&input.payload()).await?;
        verify::equals(response.status(), 400, "Expected status code 400 for duplicate email")?;
        verify::contains(response.text(), "Email already exists", "Duplicate email message")
    }
    .boxed()
}

fn invalid_user<'a>(s: &'a mut ApiState, p: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        // Sent as-is so malformed fields reach the service untouched
        let body = p.get(0)?;
        let response = s.api.create_user(body).await?;

        verify::equals(response.status(), 400, "Expected status code 400 for invalid user data")?;
        verify::contains(response.text(), "error", "Response should contain an error message")
    }
    .boxed()
}

fn without_auth<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let input = s.valid_user(0)?;
        s.api.set_token(None);
        let response = s.api.create_user(&input.payload()).await;
        s.restore_token();

        let response = response?;
        verify::equals(response.status(), 403, "Expected status code 403 without authentication")?;
        verify::contains(response.text(), "Invalid or expired token", "Authentication error message")
    }
    .boxed()
}

fn without_age<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let input = User::new("No Age User", "no.age@example.com");
        let created = s.create_tracked(&input).await?;

        verify::is_none(&created.age, "Age should be absent when omitted")?;
        verify::equals(created.email.as_deref(), Some("no.age@example.com"), "Email should be echoed")
    }
    .boxed()
}
