//! Partial updates against one user kept for the whole suite

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use super::{reapply_token, release, rows, ApiState};
use crate::error::E2eResult;
use crate::model::{age_of, User, UserFields};
use crate::suite::{Case, CaseParams, HarnessContext, Suite};
use crate::verify;

pub fn suite() -> Suite<ApiState> {
    Suite::new("patch_user", setup)
        .tag("api")
        .before_each(reapply_token)
        .after_all(release)
        .provider("patchUserData", patch_user_data)
        .case(Case::new("update_user_completely", update_completely).priority(1))
        .case(
            Case::new("patch_user_partially", patch_partially)
                .priority(2)
                .data("patchUserData"),
        )
        .case(Case::new("patch_invalid_id", invalid_id).priority(3))
        .case(Case::new("patch_missing_required_fields", missing_required).priority(4))
        .case(Case::new("patch_duplicate_email", duplicate_email).priority(5))
        .case(Case::new("patch_without_auth", without_auth).priority(6))
        .case(Case::new("patch_without_age", without_age).priority(7))
        .case(
            Case::new("patch_updates_timestamp", timestamp_changes)
                .priority(8)
                .describe("updatedAt moves after an update at least one second later"),
        )
}

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

fn patch_user_data(ctx: &HarnessContext) -> E2eResult<Vec<Vec<Value>>> {
    rows(ctx.fixtures.patch_user_data()?)
}

fn update_completely<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let data = match s.fixtures.update_user_data()?.into_iter().next() {
            Some(fields) => fields,
            None => User::new("Updated User", "updated.complete@example.com")
                .with_age(31)
                .overlay(&UserFields::new()),
        };

        let response = s.api.update_user(&id, &data).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user update")?;
        let updated = response.as_user()?;
        verify::equals(updated.id.as_deref(), Some(id.as_str()), "User ID should remain the same")?;
        verify::equals(
            updated.name.as_deref(),
            data.get("name").and_then(Value::as_str),
            "Name should be updated",
        )?;
        verify::equals(
            updated.email.as_deref(),
            data.get("email").and_then(Value::as_str),
            "Email should be updated",
        )
    }
    .boxed()
}

/// Lay the patch over the current record and send the whole thing
fn patch_partially<'a>(s: &'a mut ApiState, p: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let patch: UserFields = p.parse(0)?;
        let current = s.api.get_user(&id).await?.as_user()?;
        let merged = current.overlay(&patch);

        let response = s.api.patch_user(&id, &merged).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user patch")?;
        let updated = response.json()?;
        verify::equals(
            updated.get("id").and_then(Value::as_str),
            Some(id.as_str()),
            "User ID should remain the same",
        )?;
        for key in ["name", "email"] {
            if let Some(expected) = patch.get(key) {
                verify::equals(updated.get(key), Some(expected), &format!("{} should be updated", key))?;
            }
        }
        if patch.contains_key("age") {
            let updated_age = updated.get("age").and_then(Value::as_i64);
            verify::equals(updated_age, age_of(&patch), "Age should be updated")?;
        }
        Ok(())
    }
    .boxed()
}

fn invalid_id<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let data = json!({ "name": "Updated Name", "email": "updated@test.com", "age": 30 });
        let response = s.api.patch_user("invalid-user-id-123", &data).await?;
        verify::equals(response.status(), 404, "Expected status code 404 for invalid user")?;
        verify::contains(response.text(), "User not found", "Expected error message for user not found")
    }
    .boxed()
}

fn missing_required<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let without_name = json!({ "email": "test@example.com", "age": 25 });
        let response = s.api.patch_user(&id, &without_name).await?;
        verify::equals(response.status(), 400, "Should fail when name is missing")?;

        let without_email = json!({ "name": "Test User", "age": 25 });
        let response = s.api.patch_user(&id, &without_email).await?;
        verify::equals(response.status(), 400, "Should fail when email is missing")
    }
    .boxed()
}

fn duplicate_email<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let another = s.valid_user(1)?;
        let second = s.create_tracked(&another).await?;
        let second_id = second.id().unwrap_or_default().to_string();

        let data = json!({ "name": "Updated Name", "email": another.email, "age": 30 });
        let outcome = match s.api.patch_user(&id, &data).await {
            Ok(response) => verify::equals(response.status(), 400, "Expected status code 400 for duplicate email")
                .and_then(|_| {
                    verify::contains(response.text(), "Email already exists", "Duplicate email message")
                }),
            Err(e) => Err(e),
        };

        s.api.delete_user(&second_id).await?;
        outcome
    }
    .boxed()
}

fn without_auth<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let data = json!({ "name": "Updated Name", "email": "updated@test.com", "age": 30 });
        s.api.set_token(None);
        let response = s.api.patch_user(&id, &data).await;
        s.restore_token();

        let response = response?;
        verify::equals(response.status(), 403, "Expected status code 403 for unauthenticated request")?;
        verify::contains(response.text(), "Invalid or expired token", "Authentication error message")
    }
    .boxed()
}

fn without_age<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let data = User::new("Updated Name", "noupdate@test.com");
        let response = s.api.patch_user(&id, &data).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user update without age")?;

        let updated = response.as_user()?;
        verify::equals(updated.name, data.name, "Name should be updated")?;
        verify::equals(updated.email, data.email, "Email should be updated")
    }
    .boxed()
}

fn timestamp_changes<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let before = s.api.get_user(&id).await?.as_user()?;

        tokio::time::sleep(Duration::from_secs(1)).await;

        let data = json!({ "name": "Updated Name", "email": "timestamp@test.com", "age": 30 });
        let response = s.api.patch_user(&id, &data).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user update")?;
        let updated = response.as_user()?;
        verify::not_equals(
            updated.updated_at,
            before.updated_at,
            "UpdatedAt timestamp should change after update",
        )
    }
    .boxed()
}
