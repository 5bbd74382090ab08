//! Full updates against a user created fresh for every case

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use super::{connect, invalid_users, release, rows, ApiState};
use crate::error::E2eResult;
use crate::model::{age_of, User, UserFields};
use crate::suite::{Case, CaseParams, HarnessContext, Suite};
use crate::verify;

pub fn suite() -> Suite<ApiState> {
    Suite::new("put_user", connect)
        .tag("api")
        .before_each(create_working_user)
        .after_each(delete_working_user)
        .after_all(release)
        .provider("updateUserData", update_user_data)
        .provider("invalidUsers", invalid_users)
        .case(Case::new("update_with_valid_data", valid_update).priority(1))
        .case(
            Case::new("update_with_multiple_valid_data", provided_update)
                .priority(2)
                .data("updateUserData"),
        )
        .case(Case::new("update_non_existent_id", non_existent_id).priority(3))
        .case(
            Case::new("update_with_invalid_data", invalid_update)
                .priority(4)
                .data("invalidUsers"),
        )
        .case(Case::new("update_with_duplicate_email", duplicate_email).priority(5))
        .case(Case::new("update_without_auth", without_auth).priority(6))
        .case(Case::new("update_missing_required_fields", missing_required).priority(7))
        .case(Case::new("update_optional_age", optional_age).priority(8))
        .case(Case::new("update_partial_data", partial_data).priority(9))
        .case(Case::new("update_with_same_data", same_data).priority(10))
        .case(Case::new("update_with_invalid_token", invalid_token).priority(11))
}

fn update_user_data(ctx: &HarnessContext) -> E2eResult<Vec<Vec<Value>>> {
    rows(ctx.fixtures.update_user_data()?)
}

fn create_working_user<'a>(s: &'a mut ApiState) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.restore_token();
        let user = s.valid_user(0)?;
        let created = s.create_tracked(&user).await?;
        s.user_id = created.id;
        Ok(())
    }
    .boxed()
}

fn delete_working_user<'a>(s: &'a mut ApiState) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.restore_token();
        if let Some(id) = s.user_id.take() {
            s.api.delete_user(&id).await?;
        }
        Ok(())
    }
    .boxed()
}

fn valid_update<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let update = s.valid_user(1)?;
        let response = s.api.update_user(&id, &update.payload()).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for successful user update")?;

        let updated = response.as_user()?;
        verify::equals(updated.id.as_deref(), Some(id.as_str()), "User ID should remain the same")?;
        verify::equals(updated.name.as_deref(), update.name.as_deref(), "Name should be updated")?;
        verify::equals(updated.email.as_deref(), update.email.as_deref(), "Email should be updated")?;
        verify::equals(updated.age_number(), update.age_number(), "Age should be updated")?;
        verify::is_some(&updated.updated_at, "UpdatedAt should not be null")?;

        let fetched = s.api.get_user(&id).await?;
        verify::equals(fetched.status(), 200, "Should be able to fetch updated user")?;
        let fetched = fetched.as_user()?;
        verify::equals(fetched.name, update.name, "Fetched user name should match updated name")?;
        verify::equals(fetched.email, update.email, "Fetched user email should match updated email")
    }
    .boxed()
}

fn provided_update<'a>(s: &'a mut ApiState, p: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let update: UserFields = p.parse(0)?;
        let response = s.api.update_user(&id, &update).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for successful user update")?;

        let updated = response.as_user()?;
        verify::equals(updated.id.as_deref(), Some(id.as_str()), "User ID should remain the same")?;
        verify::equals(
            updated.name.as_deref(),
            update.get("name").and_then(Value::as_str),
            "Name should be updated",
        )?;
        verify::equals(
            updated.email.as_deref(),
            update.get("email").and_then(Value::as_str),
            "Email should be updated",
        )?;
        if let Some(age) = age_of(&update) {
            verify::equals(updated.age_number(), Some(age), "Age should be updated")?;
        }
        Ok(())
    }
    .boxed()
}

fn non_existent_id<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let update = s.valid_user(1)?;
        let response = s.api.update_user("non-existent-id-12345", &update.payload()).await?;
        verify::equals(response.status(), 404, "Expected status code 404 for non existent user")?;
        verify::contains(response.text(), "User not found", "Response should contain user not found")
    }
    .boxed()
}

fn invalid_update<'a>(s: &'a mut ApiState, p: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let response = s.api.update_user(&id, p.get(0)?).await?;
        verify::equals(response.status(), 400, "Expected status code 400 for invalid user data")?;
        verify::contains(response.text(), "error", "Response should contain error message")
    }
    .boxed()
}

fn duplicate_email<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let another = s.valid_user(2)?;
        let other = s.create_tracked(&another).await?;
        let other_id = other.id().unwrap_or_default().to_string();

        let update = json!({
            "name": "Updated Name",
            "email": another.email,
            "age": 30,
        });
        let outcome = match s.api.update_user(&id, &update).await {
            Ok(response) => verify::equals(response.status(), 400, "Expected status code 400 for duplicate email")
                .and_then(|_| {
                    verify::contains(response.text(), "Email already exists", "Duplicate email message")
                }),
            Err(e) => Err(e),
        };

        s.api.delete_user(&other_id).await?;
        outcome
    }
    .boxed()
}

fn without_auth<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let update = s.valid_user(1)?;
        s.api.set_token(None);
        let response = s.api.update_user(&id, &update.payload()).await;
        s.restore_token();

        let response = response?;
        verify::equals(response.status(), 403, "Expected status code 403 for unauthenticated request")?;
        verify::contains(response.text(), "Invalid or expired token", "Authentication error message")
    }
    .boxed()
}

fn missing_required<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let without_name = json!({ "email": "Updated@example.com", "age": 25 });
        let response = s.api.update_user(&id, &without_name).await?;
        verify::equals(response.status(), 400, "Should fail when name is missing")?;

        let without_email = json!({ "name": "Updated User", "age": 25 });
        let response = s.api.update_user(&id, &without_email).await?;
        verify::equals(response.status(), 400, "Should fail when email is missing")
    }
    .boxed()
}

fn optional_age<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let update = User::new("Updated User No Age", "updated.noage@example.com");
        let response = s.api.update_user(&id, &update).await?;
        verify::equals(response.status(), 200, "User update should succeed without age")?;

        let updated = response.as_user()?;
        verify::equals(updated.id.as_deref(), Some(id.as_str()), "User ID should remain same")?;
        verify::equals(updated.name.as_deref(), Some("Updated User No Age"), "Name should be updated")?;
        verify::equals(
            updated.email.as_deref(),
            Some("updated.noage@example.com"),
            "Email should be updated",
        )
    }
    .boxed()
}

fn partial_data<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let current = s.api.get_user(&id).await?.as_user()?;
        let update = User {
            name: Some("Partially Updated Name".into()),
            email: current.email.clone(),
            age: current.age.clone(),
            ..Default::default()
        };

        let response = s.api.update_user(&id, &update).await?;
        verify::equals(response.status(), 200, "Partial update should succeed")?;
        let updated = response.as_user()?;
        verify::equals(updated.name.as_deref(), Some("Partially Updated Name"), "Name should be updated")?;
        verify::equals(updated.email.as_deref(), current.email.as_deref(), "Email should remain same")?;
        verify::equals(updated.age_number(), current.age_number(), "Age should remain same")
    }
    .boxed()
}

fn same_data<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let current = s.api.get_user(&id).await?.as_user()?;
        let same = User {
            name: current.name.clone(),
            email: current.email.clone(),
            age: Some(current.age_number().map(Value::from).unwrap_or_else(|| json!(25))),
            ..Default::default()
        };

        let response = s.api.update_user(&id, &same).await?;
        verify::equals(response.status(), 200, "Update should succeed")?;
        let updated = response.as_user()?;
        verify::equals(updated.name, current.name, "Name should remain same")?;
        verify::equals(updated.email, current.email, "Email should remain same")
    }
    .boxed()
}

fn invalid_token<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = s.user_id()?;
        let update = s.valid_user(1)?;
        s.api.set_token(Some("invalid-token-1234".to_string()));
        let response = s.api.update_user(&id, &update.payload()).await;
        s.restore_token();

        let response = response?;
        verify::equals(response.status(), 403, "Status code 403 for invalid token")?;
        verify::contains(response.text(), "Invalid", "Response should contain invalid token error")
    }
    .boxed()
}
