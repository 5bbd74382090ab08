//! Browser suite: the complete user flow and the form validation scenarios

use std::path::PathBuf;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};
use crate::playwright::PageHandle;
use crate::suite::{Case, CaseParams, HarnessContext, Suite, SuiteState};
use crate::ui::{FlowOutcome, UiDriver, UiSession, UserForm};
use crate::verify;

pub const REQUIRED_FIELDS_ERROR: &str = "Name and email are required";
pub const EMAIL_FORMAT_ERROR: &str = "Email must contain @ symbol and be in valid format";
pub const AGE_RANGE_ERROR: &str = "Age must be a valid number between 0 and 150, or omitted entirely";

/// Browser for the suite, one session per case
pub struct UiState {
    driver: UiDriver,
    session: Option<UiSession<PageHandle>>,
    artifacts: Vec<PathBuf>,
    username: String,
    password: String,
}

impl SuiteState for UiState {
    fn drain_artifacts(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.artifacts)
    }
}

impl UiState {
    fn session(&mut self) -> E2eResult<&mut UiSession<PageHandle>> {
        self.session
            .as_mut()
            .ok_or_else(|| E2eError::ui("session", "no page open for this case"))
    }
}

pub fn suite() -> Suite<UiState> {
    Suite::new("ui", launch)
        .tag("ui")
        .before_each(open_page)
        .after_each(close_page)
        .after_all(shutdown)
        .provider("invalidForms", invalid_forms)
        .case(
            Case::new("complete_user_flow", complete_user_flow)
                .priority(1)
                .describe("Login -> Add User -> Edit User -> Delete User -> Logout"),
        )
        .case(
            Case::new("invalid_user_form", invalid_user_form)
                .priority(2)
                .data("invalidForms")
                .describe("Create is rejected with a visible validation error"),
        )
}

fn launch<'a>(ctx: &'a HarnessContext) -> BoxFuture<'a, E2eResult<UiState>> {
    async move {
        let driver = UiDriver::launch(&ctx.settings).await?;
        Ok(UiState {
            driver,
            session: None,
            artifacts: Vec::new(),
            username: ctx.settings.auth_username.clone(),
            password: ctx.settings.auth_password.clone(),
        })
    }
    .boxed()
}

fn open_page<'a>(s: &'a mut UiState) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        s.session = Some(s.driver.open_session().await?);
        Ok(())
    }
    .boxed()
}

fn close_page<'a>(s: &'a mut UiState) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        if let Some(mut session) = s.session.take() {
            s.artifacts.extend(session.take_artifacts());
            session.close().await?;
        }
        Ok(())
    }
    .boxed()
}

fn shutdown(s: UiState) -> BoxFuture<'static, E2eResult<()>> {
    async move {
        let UiState { driver, session, .. } = s;
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!("Closing leftover page failed: {}", e);
            }
        }
        driver.close().await
    }
    .boxed()
}

/// `[scenario, name, email, age or null, expected error]`
fn invalid_forms(_: &HarnessContext) -> E2eResult<Vec<Vec<Value>>> {
    Ok(vec![
        form_row("empty_name", "", "sowmya@abc.com", Some("30"), REQUIRED_FIELDS_ERROR),
        form_row("empty_email", "sowmya", "", Some("30"), REQUIRED_FIELDS_ERROR),
        form_row("invalid_email", "sowmya", "sowmyaabc.com", Some("30"), EMAIL_FORMAT_ERROR),
        form_row("missing_age", "sowmya", "sowmya@abc.com", None, AGE_RANGE_ERROR),
        form_row("negative_age", "sowmya", "sowmya@abc.com", Some("-5"), AGE_RANGE_ERROR),
    ])
}

fn form_row(scenario: &str, name: &str, email: &str, age: Option<&str>, expected: &str) -> Vec<Value> {
    vec![json!(scenario), json!(name), json!(email), json!(age), json!(expected)]
}

fn report(flow: &str, outcome: FlowOutcome) {
    match outcome {
        FlowOutcome::Completed => info!("{} flow completed", flow),
        FlowOutcome::Incomplete(reason) => warn!("{} flow incomplete: {}", flow, reason),
    }
}

fn complete_user_flow<'a>(s: &'a mut UiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let (username, password) = (s.username.clone(), s.password.clone());
        let session = s.session()?;

        let on_login_page = session.on_login_page().await?;
        verify::is_true(on_login_page, "should be on Login page")?;
        session.capture("1_login_page").await;

        session.login(&username, &password).await?;
        session.capture("2_after_login").await;
        if !session.is_logged_in().await {
            warn!("Login failed, check if backend is running");
        }

        let form = UserForm::new("sowmya", "sowmya@abc.com", Some("30"));
        report("add user", session.add_user_flow(&form).await);
        report("edit user", session.edit_user_flow().await);
        session.delete_user_flow().await?;
        report("logout", session.logout_flow().await);
        Ok(())
    }
    .boxed()
}

fn invalid_user_form<'a>(s: &'a mut UiState, p: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let scenario = p.str(0)?.to_string();
        let form = UserForm::new(p.str(1)?, p.str(2)?, p.get(3)?.as_str());
        let expected = p.str(4)?.to_string();
        let (username, password) = (s.username.clone(), s.password.clone());

        s.session()?
            .submit_invalid_user(&scenario, (&username, &password), &form, &expected)
            .await
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessSettings;
    use crate::fixtures::FixtureStore;

    #[test]
    fn invalid_forms_cover_every_validation_message() {
        let ctx = HarnessContext::new(
            HarnessSettings::for_backend("http://localhost", 1),
            FixtureStore::load(&crate::fixtures::default_testdata_path()).unwrap(),
        );
        let rows = invalid_forms(&ctx).unwrap();
        assert_eq!(rows.len(), 5);

        let expected: Vec<&str> = rows.iter().map(|r| r[4].as_str().unwrap()).collect();
        assert!(expected.contains(&REQUIRED_FIELDS_ERROR));
        assert!(expected.contains(&EMAIL_FORMAT_ERROR));
        assert!(expected.contains(&AGE_RANGE_ERROR));

        let missing_age = rows.iter().find(|r| r[0] == "missing_age").unwrap();
        assert!(missing_age[3].is_null());
    }

    #[test]
    fn suite_orders_flow_before_negative_scenarios() {
        let suite = suite();
        let names: Vec<&str> = suite.cases().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["complete_user_flow", "invalid_user_form"]);
        assert_eq!(suite.tags, vec!["ui".to_string()]);
    }
}
