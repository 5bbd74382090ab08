//! Login, token verification, logout and health

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::{rows, ApiState};
use crate::error::E2eResult;
use crate::model::Credentials;
use crate::suite::{Case, CaseParams, HarnessContext, Suite};
use crate::verify;

const INVALID_LOGIN: &str = "Invalid username or password";
const INVALID_TOKEN: &str = "Invalid or expired token";

/// Both wordings have shipped for the logout confirmation
const LOGOUT_MESSAGES: [&str; 2] = ["Logged out successfully", "Successfully logged out"];

/// Upper bound for a login round trip
const LOGIN_BUDGET_MS: u128 = 3000;

pub fn suite() -> Suite<ApiState> {
    Suite::new("authentication", setup)
        .tag("api")
        .tag("auth")
        .provider("invalidCredentials", invalid_credentials)
        .case(Case::new("valid_login", valid_login).priority(1).describe("Positive scenario"))
        .case(
            Case::new("invalid_login", invalid_login)
                .priority(2)
                .data("invalidCredentials"),
        )
        .case(Case::new("login_with_blank_credentials", blank_credentials).priority(3))
        .case(Case::new("token_verification", token_verification).priority(4))
        .case(Case::new("logout", logout).priority(5))
        .case(Case::new("logout_without_token", logout_without_token).priority(6))
        .case(Case::new("verify_without_token", verify_without_token).priority(7))
        .case(Case::new("verify_invalid_token", verify_invalid_token).priority(8))
        .case(Case::new("health_check", health_check).priority(9))
        .case(Case::new("login_response_time", login_response_time).priority(10))
}

fn setup<'a>(ctx: &'a HarnessContext) -> BoxFuture<'a, E2eResult<ApiState>> {
    async move { ApiState::anonymous(ctx) }.boxed()
}

fn invalid_credentials(ctx: &HarnessContext) -> E2eResult<Vec<Vec<Value>>> {
    rows(ctx.fixtures.invalid_credentials()?)
}

/// Log in with the fixture account, leaving its token on the client
async fn sign_in(s: &mut ApiState) -> E2eResult<Credentials> {
    let credentials = s.fixtures.valid_credentials()?;
    let token = s
        .api
        .authenticate(&credentials.username, &credentials.password)
        .await?;
    verify::is_some(&token, "Authentication should succeed")?;
    Ok(credentials)
}

fn valid_login<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let credentials = s.fixtures.valid_credentials()?;
        let response = s.api.login(&credentials.username, &credentials.password).await?;

        verify::equals(response.status(), 200, "Expected status code 200 for valid login")?;
        verify::is_some(&response.json_path("token"), "Token should not be null")?;
        verify::is_some(&response.json_path("user.username"), "Username should not be null")?;
        verify::is_some(&response.json_path("user.role"), "Role should not be null")?;
        verify::is_some(&response.json_path("expiresAt"), "ExpiresAt should not be null")?;
        verify::equals(
            response.json_path("user.username"),
            Some(credentials.username),
            "Username in response should match",
        )
    }
    .boxed()
}

fn invalid_login<'a>(s: &'a mut ApiState, p: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let credentials: Credentials = p.parse(0)?;
        let response = s.api.login(&credentials.username, &credentials.password).await?;

        verify::equals(response.status(), 401, "Expected status code 401 for invalid login")?;
        verify::contains(
            response.text(),
            INVALID_LOGIN,
            "Response should contain 'Invalid username or password' message",
        )
    }
    .boxed()
}

fn blank_credentials<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let blank_username = s.api.login(" ", "password123").await?;
        verify::equals(blank_username.status(), 401, "Expected status code 401 for missing username")?;
        verify::contains(blank_username.text(), INVALID_LOGIN, "Missing username message")?;

        let blank_password = s.api.login("admin", " ").await?;
        verify::equals(blank_password.status(), 401, "Expected status code 401 for missing password")?;
        verify::contains(blank_password.text(), INVALID_LOGIN, "Missing password message")
    }
    .boxed()
}

fn token_verification<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let credentials = sign_in(s).await?;
        let response = s.api.verify_token().await?;

        verify::equals(response.status(), 200, "Expected status code 200 for token verification")?;
        verify::equals(
            response.json_path("user.username"),
            Some(credentials.username),
            "Username in response should match",
        )
    }
    .boxed()
}

fn logout<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        sign_in(s).await?;
        let response = s.api.logout().await?;

        verify::equals(response.status(), 200, "Expected status code 200 for logout")?;
        verify::is_true(
            LOGOUT_MESSAGES.iter().any(|m| response.body_contains(m)),
            "Response should contain the logout confirmation",
        )?;

        // The session is gone server-side
        let revoked = s.api.verify_token().await?;
        verify::equals(revoked.status(), 403, "Token should be rejected after logout")
    }
    .boxed()
}

fn logout_without_token<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.api.set_token(None);
        let response = s.api.logout().await?;

        verify::equals(response.status(), 200, "Expected status code 200 for logout without token")?;
        verify::is_true(
            LOGOUT_MESSAGES.iter().any(|m| response.body_contains(m)),
            "Response should contain the logout confirmation",
        )
    }
    .boxed()
}

fn verify_without_token<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.api.set_token(None);
        let response = s.api.verify_token().await?;

        verify::equals(
            response.status(),
            403,
            "Expected status code 403 for token verification without authentication",
        )?;
        verify::contains(response.text(), INVALID_TOKEN, "Response should contain authentication error")
    }
    .boxed()
}

fn verify_invalid_token<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.api.set_token(Some("invalid-token-123".to_string()));
        let response = s.api.verify_token().await?;

        verify::equals(response.status(), 403, "Expected status code 403 for invalid token")?;
        verify::contains(response.text(), INVALID_TOKEN, "Response should contain invalid token error")
    }
    .boxed()
}

fn health_check<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let response = s.api.health_check().await?;

        verify::equals(response.status(), 200, "Expected status code 200 for health check")?;
        verify::equals(response.json_path("status").as_deref(), Some("OK"), "Health status should be OK")?;
        verify::is_some(&response.json_path("timestamp"), "Timestamp should not be null")
    }
    .boxed()
}

fn login_response_time<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let credentials = s.fixtures.valid_credentials()?;
        let response = s.api.login(&credentials.username, &credentials.password).await?;

        verify::equals(response.status(), 200, "Expected status code 200 for valid login")?;
        verify::less_than(response.elapsed_ms(), LOGIN_BUDGET_MS, "Login should answer within 3000 ms")
    }
    .boxed()
}
