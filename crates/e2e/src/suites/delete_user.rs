//! Deleting users

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{connect, reapply_token, release, ApiState};
use crate::error::E2eResult;
use crate::suite::{Case, CaseParams, Suite};
use crate::verify;

const NOT_FOUND: &str = "User not found";

pub fn suite() -> Suite<ApiState> {
    Suite::new("delete_user", connect)
        .tag("api")
        .before_each(reapply_token)
        .after_all(release)
        .case(Case::new("delete_existing_user", delete_existing).priority(1))
        .case(Case::new("delete_non_existent_user", non_existent).priority(2))
        .case(Case::new("delete_with_invalid_id", invalid_id).priority(3))
        .case(Case::new("delete_without_auth", without_auth).priority(4))
        .case(Case::new("delete_multiple_users", multiple).priority(5))
        .case(Case::new("delete_returns_user_data", returned_data).priority(6))
        .case(Case::new("delete_same_user_again", delete_twice).priority(7))
        .case(Case::new("delete_removes_from_list", removed_from_list).priority(8))
}

/// Create valid user `index` and return its id
async fn create(s: &mut ApiState, index: usize) -> E2eResult<String> {
    let user = s.valid_user(index)?;
    let created = s.create_tracked(&user).await?;
    Ok(created.id.unwrap_or_default())
}

fn delete_existing<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = create(s, 0).await?;

        let response = s.api.delete_user(&id).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user deletion")?;
        verify::contains(response.text(), "User deleted successfully", "Expected success message")?;
        verify::contains(response.text(), &id, "Response should contain the deleted user")?;

        let fetched = s.api.get_user(&id).await?;
        verify::equals(fetched.status(), 404, "Expected status code 404 for deleted user")?;
        verify::contains(fetched.text(), NOT_FOUND, "Expected 'User not found' for deleted user")
    }
    .boxed()
}

fn non_existent<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.delete_user("99999999999999999").await?;
        verify::equals(response.status(), 404, "Expected status code 404 for non-existing user")?;
        verify::contains(response.text(), NOT_FOUND, "Response should contain 'User not found'")
    }
    .boxed()
}

fn invalid_id<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.delete_user("invalid-user=id-123").await?;
        verify::equals(response.status(), 404, "Expected status code 404 for invalid user ID")?;
        verify::contains(response.text(), NOT_FOUND, "Response should contain 'User not found'")
    }
    .boxed()
}

fn without_auth<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = create(s, 1).await?;

        s.api.set_token(None);
        let response = s.api.delete_user(&id).await;
        s.restore_token();

        let response = response?;
        verify::equals(response.status(), 403, "Expected status code 403 for unauthorized deletion")?;
        verify::contains(response.text(), "Invalid or expired token", "Authentication error message")?;

        let cleanup = s.api.delete_user(&id).await?;
        verify::equals(cleanup.status(), 200, "User should still exist after the rejected deletion")
    }
    .boxed()
}

fn multiple<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let first = create(s, 0).await?;
        let second = create(s, 1).await?;

        for id in [&first, &second] {
            let response = s.api.delete_user(id).await?;
            verify::equals(response.status(), 200, "Expected status code 200 for user deletion")?;
        }
        for id in [&first, &second] {
            let response = s.api.get_user(id).await?;
            verify::equals(response.status(), 404, "Expected status code 404 for deleted user")?;
        }
        Ok(())
    }
    .boxed()
}

fn returned_data<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let user = s.valid_user(2)?;
        let id = create(s, 2).await?;

        let response = s.api.delete_user(&id).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user deletion")?;
        verify::is_some(&response.json_path("message"), "Response should contain a message field")?;
        verify::equals(
            response.json_path("user.name"),
            user.name,
            "Response should contain the deleted user's name",
        )?;
        verify::equals(
            response.json_path("user.email"),
            user.email,
            "Response should contain the deleted user's email",
        )
    }
    .boxed()
}

fn delete_twice<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let id = create(s, 1).await?;

        let first = s.api.delete_user(&id).await?;
        verify::equals(first.status(), 200, "Expected status code 200 for first deletion")?;

        let second = s.api.delete_user(&id).await?;
        verify::equals(second.status(), 404, "Expected status code 404 for second deletion")?;
        verify::contains(second.text(), NOT_FOUND, "Expected 'User not found' for second deletion")
    }
    .boxed()
}

/// Listing sizes around a single deletion
fn shrank_by_one(before: usize, after: usize) -> E2eResult<()> {
    verify::equals(after.checked_add(1), Some(before), "User count should decrease by 1")
}

fn removed_from_list<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let mut ids = Vec::with_capacity(3);
        for index in 0..3 {
            ids.push(create(s, index).await?);
        }

        let before = s.api.list_users().await?.len();
        let response = s.api.delete_user(&ids[1]).await?;
        verify::equals(response.status(), 200, "Expected status code 200 for user deletion")?;

        let after = s.api.list_users().await?;
        shrank_by_one(before, after.len())?;
        verify::is_false(
            after.iter().any(|u| u.id() == Some(ids[1].as_str())),
            "Deleted user should not be present in the list",
        )?;

        for id in [&ids[0], &ids[2]] {
            s.api.delete_user(id).await?;
        }
        Ok(())
    }
    .boxed()
}
