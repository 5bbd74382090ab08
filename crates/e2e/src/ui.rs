//! Browser flows against the user-management frontend
//!
//! [`UiDriver`] owns the browser for a suite; each case opens a
//! [`UiSession`] (own context and page) and drives named flows through it.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::HarnessSettings;
use crate::error::{E2eError, E2eResult};
use crate::playwright::{
    BrowserSession, DialogPolicy, DialogRecord, LoadState, Locator, PageDriver, PageHandle, Viewport,
    WaitState,
};
use crate::verify;

/// Text of the confirm dialog shown before a user is deleted
pub const DELETE_CONFIRMATION: &str = "Are you sure you want to delete this user?";

/// How long to wait for an expected element to show up
pub const ELEMENT_WAIT: Duration = Duration::from_secs(10);

/// How long to wait for the delete confirmation to be recorded
const DIALOG_WAIT: Duration = Duration::from_secs(5);

/// Values typed into the add/edit form.
///
/// `age: None` leaves the age input untouched, which is not the same as
/// typing an empty string into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub age: Option<String>,
}

impl UserForm {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: Option<&str>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age: age.map(String::from),
        }
    }
}

/// Result of a best-effort flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed,
    Incomplete(String),
}

impl FlowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, FlowOutcome::Completed)
    }
}

/// Where screenshots go, and which ones were taken
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    step_dir: PathBuf,
    root_dir: PathBuf,
    captured: Vec<PathBuf>,
}

impl ScreenshotStore {
    pub fn new(step_dir: impl Into<PathBuf>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            step_dir: step_dir.into(),
            root_dir: root_dir.into(),
            captured: Vec::new(),
        }
    }

    /// `<step_dir>/<name>.png`
    pub fn step_path(&self, name: &str) -> PathBuf {
        self.step_dir.join(format!("{}.png", name))
    }

    /// `<root_dir>/<file>`
    pub fn named_path(&self, file: &str) -> PathBuf {
        self.root_dir.join(file)
    }

    fn record(&mut self, path: PathBuf) {
        self.captured.push(path);
    }

    pub fn captured(&self) -> &[PathBuf] {
        &self.captured
    }

    /// Hand over everything captured so far
    pub fn drain(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.captured)
    }
}

/// Browser owner for one suite
pub struct UiDriver {
    browser: BrowserSession,
    settings: HarnessSettings,
}

impl UiDriver {
    pub async fn launch(settings: &HarnessSettings) -> E2eResult<Self> {
        let browser = BrowserSession::launch(settings).await?;
        Ok(Self {
            browser,
            settings: settings.clone(),
        })
    }

    /// New context and page, navigated to the frontend
    pub async fn open_session(&self) -> E2eResult<UiSession<PageHandle>> {
        let page = self.browser.new_page(Viewport::default()).await?;
        let mut session = UiSession::new(page, &self.settings);
        session.open().await?;
        Ok(session)
    }

    pub async fn close(self) -> E2eResult<()> {
        info!("Closing browser");
        self.browser.close().await
    }
}

/// One page and the flows that run on it
pub struct UiSession<P: PageDriver> {
    page: P,
    frontend_url: String,
    screenshots: ScreenshotStore,
    username: Option<String>,
}

impl<P: PageDriver> UiSession<P> {
    pub fn new(page: P, settings: &HarnessSettings) -> Self {
        Self {
            page,
            frontend_url: settings.frontend_url(),
            screenshots: ScreenshotStore::new(&settings.artifacts_dir, &settings.artifacts_root),
            username: None,
        }
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }

    /// Screenshots taken since the last call
    pub fn take_artifacts(&mut self) -> Vec<PathBuf> {
        self.screenshots.drain()
    }

    /// Navigate to the frontend and wait for it to load
    pub async fn open(&mut self) -> E2eResult<()> {
        let url = self.frontend_url.clone();
        self.page.goto(&url).await?;
        self.page.wait_for_load_state(LoadState::Load).await
    }

    pub async fn close(mut self) -> E2eResult<()> {
        self.page.close().await
    }

    /// Full-page step screenshot under the artifacts directory
    pub async fn capture(&mut self, name: &str) {
        let path = self.screenshots.step_path(name);
        self.capture_to(path).await;
    }

    /// Named screenshot under the artifacts root
    pub async fn capture_named(&mut self, file: &str) {
        let path = self.screenshots.named_path(file);
        self.capture_to(path).await;
    }

    async fn capture_to(&mut self, path: PathBuf) {
        match self.page.screenshot(&path, true).await {
            Ok(()) => {
                debug!("Screenshot saved: {}", path.display());
                self.screenshots.record(path);
            }
            Err(e) => warn!("Failed to take screenshot {}: {}", path.display(), e),
        }
    }

    pub async fn on_login_page(&mut self) -> E2eResult<bool> {
        self.page.is_visible(&password_input()).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> E2eResult<()> {
        self.page
            .fill(&Locator::placeholder("Enter your username").first(), username)
            .await?;
        self.page
            .fill(&Locator::placeholder("Enter your password"), password)
            .await?;
        self.capture_named("loginFill.png").await;
        self.page.click(&Locator::button("Sign In").first()).await?;
        self.username = Some(username.to_string());
        Ok(())
    }

    /// Any sign of the logged-in shell counts. Errors read as "not logged in".
    pub async fn is_logged_in(&mut self) -> bool {
        match self.check_logged_in().await {
            Ok(logged_in) => {
                if logged_in {
                    info!("Successfully logged in");
                } else {
                    warn!("Login not successful");
                }
                logged_in
            }
            Err(e) => {
                warn!("Error when checking if login is successful: {}", e);
                false
            }
        }
    }

    async fn check_logged_in(&mut self) -> E2eResult<bool> {
        let _ = self.page.wait_for_load_state(LoadState::Load).await;

        let welcome = format!("Welcome, {}", self.username.as_deref().unwrap_or("admin"));
        let has_welcome = self.page.is_visible(&Locator::text(welcome)).await?;
        let has_title = self.page.is_visible(&Locator::text("User Management")).await?;
        self.capture_named("welcomenote.png").await;
        let has_add = self.page.is_visible(&Locator::button("Add User").first()).await?;
        let has_logout = self.page.is_visible(&Locator::button("Logout").first()).await?;

        Ok(has_welcome || has_title || has_add || has_logout)
    }

    pub async fn open_add_user_form(&mut self) -> E2eResult<()> {
        let add = Locator::css("button:has-text('Add')").first();
        if !self.page.is_visible(&add).await? {
            return Err(E2eError::ui("add_user", "No Add User button found"));
        }
        self.page.click(&add).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        self.capture("3_add_user").await;
        Ok(())
    }

    /// Fill the visible form fields. Returns whether every requested field was filled.
    pub async fn fill_add_user_form(&mut self, form: &UserForm) -> E2eResult<bool> {
        let name_filled = self
            .fill_if_visible(&Locator::css("input[placeholder*='name']").first(), &form.name)
            .await?;
        let email_filled = self
            .fill_if_visible(&Locator::css("input[placeholder*='email']").first(), &form.email)
            .await?;
        let age_filled = match &form.age {
            Some(age) => {
                self.fill_if_visible(&Locator::css("input[placeholder*='age']").first(), age)
                    .await?
            }
            None => true,
        };

        Ok(name_filled && email_filled && age_filled)
    }

    async fn fill_if_visible(&mut self, locator: &Locator, value: &str) -> E2eResult<bool> {
        if !self.page.is_visible(locator).await? {
            debug!("Field not visible: {}", locator);
            return Ok(false);
        }
        self.page.fill(locator, value).await?;
        Ok(true)
    }

    async fn click_create(&mut self) -> E2eResult<bool> {
        let create = Locator::css("button:has-text('Create')").first();
        if !self.page.is_visible(&create).await? {
            return Ok(false);
        }
        self.page.click(&create).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        Ok(true)
    }

    /// Open the form, fill it and create the user
    pub async fn add_user_flow(&mut self, form: &UserForm) -> FlowOutcome {
        best_effort("add user", self.try_add_user(form).await)
    }

    async fn try_add_user(&mut self, form: &UserForm) -> E2eResult<()> {
        self.open_add_user_form().await?;
        if !self.fill_add_user_form(form).await? {
            return Err(E2eError::ui("add_user", "form fields not filled"));
        }
        if !self.click_create().await? {
            return Err(E2eError::ui("add_user", "Create button not visible"));
        }
        self.capture("4_form_filled").await;
        Ok(())
    }

    /// Edit the first row: append "updated" to its first prefilled field
    pub async fn edit_user_flow(&mut self) -> FlowOutcome {
        best_effort("edit user", self.try_edit_user().await)
    }

    async fn try_edit_user(&mut self) -> E2eResult<()> {
        let edit = Locator::title("Edit").first();
        if !self.page.is_visible(&edit).await? {
            return Err(E2eError::ui("edit_user", "Edit button not found"));
        }
        self.page.click(&edit).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        self.capture("5_before_edit").await;

        let field = Locator::css("input[value]:not([value=''])").first();
        if !self.page.is_visible(&field).await? {
            return Err(E2eError::ui("edit_user", "no prefilled field"));
        }
        let original = self.page.input_value(&field).await?;
        self.page.fill(&field, &format!("{}updated", original)).await?;

        let update = Locator::css("button:has-text('Update')").first();
        if !self.page.is_visible(&update).await? {
            return Err(E2eError::ui("edit_user", "Update button not visible"));
        }
        self.capture("6_after_edit").await;
        self.page.click(&update).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        self.capture_named("EditUser.png").await;
        Ok(())
    }

    /// Delete the first row, accepting the confirmation dialog
    pub async fn delete_user_flow(&mut self) -> E2eResult<()> {
        self.page
            .set_dialog_policy(DialogPolicy::Accept {
                expected: Some(DELETE_CONFIRMATION.to_string()),
            })
            .await?;
        self.page.click(&Locator::title("Delete").first()).await?;

        let dialogs = self.wait_for_dialog().await?;
        let dialog = dialogs
            .first()
            .ok_or_else(|| E2eError::ui("delete_user", "no confirmation dialog appeared"))?;
        verify::equals(
            dialog.message.as_str(),
            DELETE_CONFIRMATION,
            "Delete confirmation message",
        )?;
        verify::is_true(dialog.accepted(), "Delete confirmation should be accepted")?;

        self.capture("7_delete_confirmation").await;
        self.capture_named("DeleteUser.png").await;
        Ok(())
    }

    async fn wait_for_dialog(&mut self) -> E2eResult<Vec<DialogRecord>> {
        let deadline = tokio::time::Instant::now() + DIALOG_WAIT;
        loop {
            let dialogs = self.page.take_dialogs().await?;
            if !dialogs.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(dialogs);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Log out and confirm the login form is back
    pub async fn logout_flow(&mut self) -> FlowOutcome {
        best_effort("logout", self.try_logout().await)
    }

    async fn try_logout(&mut self) -> E2eResult<()> {
        let logout = Locator::css("button:has-text('Logout')").first();
        if !self.page.is_visible(&logout).await? {
            return Err(E2eError::ui("logout", "Logout button not found"));
        }
        self.page.click(&logout).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        self.capture("9_after_logout").await;

        self.page
            .wait_for(&password_input(), WaitState::Visible, ELEMENT_WAIT)
            .await
            .map_err(|e| E2eError::ui("logout", format!("login page did not reappear: {}", e)))?;
        self.username = None;
        Ok(())
    }

    /// Log in, submit an invalid user and require `expected_error` to show up
    pub async fn submit_invalid_user(
        &mut self,
        scenario: &str,
        credentials: (&str, &str),
        form: &UserForm,
        expected_error: &str,
    ) -> E2eResult<()> {
        self.login(credentials.0, credentials.1).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        self.open_add_user_form().await?;
        self.fill_add_user_form(form).await?;

        if !self.click_create().await? {
            return Err(E2eError::ui(scenario, "Create button not visible"));
        }

        let visible = self
            .page
            .wait_for(&Locator::text(expected_error).first(), WaitState::Visible, ELEMENT_WAIT)
            .await;
        self.capture_named(&format!("{}_error.png", scenario)).await;
        if let Err(e) = visible {
            return Err(E2eError::ui(
                scenario,
                format!("expected error '{}' not visible: {}", expected_error, e),
            ));
        }

        if let FlowOutcome::Incomplete(reason) = self.logout_flow().await {
            debug!("{}: logout after negative scenario incomplete: {}", scenario, reason);
        }
        Ok(())
    }
}

fn password_input() -> Locator {
    Locator::css("input[type='password']")
}

fn best_effort(flow: &str, result: E2eResult<()>) -> FlowOutcome {
    match result {
        Ok(()) => FlowOutcome::Completed,
        Err(e) => {
            warn!("Error during {} flow: {}", flow, e);
            FlowOutcome::Incomplete(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;

    use async_trait::async_trait;

    use crate::error::AssertionFailure;

    /// Scripted page: visibility and values are keyed by locator display
    #[derive(Default)]
    struct FakePage {
        visible: HashSet<String>,
        values: HashMap<String, String>,
        actions: Vec<String>,
        screenshots: Vec<PathBuf>,
        policy: Option<DialogPolicy>,
        dialog_message: Option<String>,
        dialogs: Vec<DialogRecord>,
        fail_waits: bool,
    }

    impl FakePage {
        fn showing(locators: &[Locator]) -> Self {
            Self {
                visible: locators.iter().map(|l| l.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakePage {
        async fn goto(&mut self, url: &str) -> E2eResult<()> {
            self.actions.push(format!("goto {}", url));
            Ok(())
        }

        async fn wait_for_load_state(&mut self, _state: LoadState) -> E2eResult<()> {
            Ok(())
        }

        async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
            self.actions.push(format!("fill {} = {}", locator, value));
            self.values.insert(locator.to_string(), value.to_string());
            Ok(())
        }

        async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
            self.actions.push(format!("click {}", locator));
            if let Some(message) = self.dialog_message.clone() {
                if locator == &Locator::title("Delete").first() {
                    let accepted = matches!(
                        &self.policy,
                        Some(DialogPolicy::Accept { expected }) if expected.as_deref().map_or(true, |e| message.contains(e))
                    );
                    self.dialogs.push(DialogRecord {
                        message,
                        kind: "confirm".into(),
                        action: if accepted { "accepted" } else { "dismissed" }.into(),
                    });
                }
            }
            Ok(())
        }

        async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
            Ok(self.visible.contains(&locator.to_string()))
        }

        async fn input_value(&mut self, locator: &Locator) -> E2eResult<String> {
            Ok(self.values.get(&locator.to_string()).cloned().unwrap_or_default())
        }

        async fn wait_for(&mut self, locator: &Locator, _state: WaitState, _timeout: Duration) -> E2eResult<()> {
            if self.fail_waits || !self.visible.contains(&locator.to_string()) {
                return Err(E2eError::Timeout(locator.to_string()));
            }
            Ok(())
        }

        async fn screenshot(&mut self, path: &Path, _full_page: bool) -> E2eResult<()> {
            self.screenshots.push(path.to_path_buf());
            Ok(())
        }

        async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> E2eResult<()> {
            self.policy = Some(policy);
            Ok(())
        }

        async fn take_dialogs(&mut self) -> E2eResult<Vec<DialogRecord>> {
            Ok(std::mem::take(&mut self.dialogs))
        }

        async fn close(&mut self) -> E2eResult<()> {
            self.actions.push("close".into());
            Ok(())
        }
    }

    fn settings() -> HarnessSettings {
        let mut settings = HarnessSettings::for_backend("http://localhost", 5000);
        settings.artifacts_dir = PathBuf::from("shots");
        settings.artifacts_root = PathBuf::from("root");
        settings
    }

    fn form_fields() -> Vec<Locator> {
        vec![
            Locator::css("button:has-text('Add')").first(),
            Locator::css("input[placeholder*='name']").first(),
            Locator::css("input[placeholder*='email']").first(),
            Locator::css("input[placeholder*='age']").first(),
            Locator::css("button:has-text('Create')").first(),
        ]
    }

    #[tokio::test]
    async fn open_navigates_to_frontend() {
        let mut session = UiSession::new(FakePage::default(), &settings());
        session.open().await.unwrap();
        assert_eq!(session.page_mut().actions, vec!["goto http://localhost:3000"]);
    }

    #[tokio::test]
    async fn login_fills_placeholders_and_captures() {
        let mut session = UiSession::new(FakePage::default(), &settings());
        session.login("admin", "password123").await.unwrap();

        let actions = &session.page_mut().actions;
        assert_eq!(actions[0], "fill placeholder=Enter your username >> nth=0 = admin");
        assert_eq!(actions[1], "fill placeholder=Enter your password = password123");
        assert_eq!(actions[2], "click role=button[name=Sign In] >> nth=0");
        assert_eq!(session.take_artifacts(), vec![PathBuf::from("root/loginFill.png")]);
    }

    #[tokio::test]
    async fn logged_in_when_any_marker_is_visible() {
        let page = FakePage::showing(&[Locator::button("Logout").first()]);
        let mut session = UiSession::new(page, &settings());
        assert!(session.is_logged_in().await);

        let mut session = UiSession::new(FakePage::default(), &settings());
        assert!(!session.is_logged_in().await);
    }

    #[tokio::test]
    async fn add_flow_without_add_button_is_incomplete() {
        let mut session = UiSession::new(FakePage::default(), &settings());
        let outcome = session
            .add_user_flow(&UserForm::new("sowmya", "sowmya@abc.com", Some("30")))
            .await;
        assert!(matches!(outcome, FlowOutcome::Incomplete(reason) if reason.contains("Add User")));
    }

    #[tokio::test]
    async fn add_flow_fills_and_creates() {
        let mut session = UiSession::new(FakePage::showing(&form_fields()), &settings());
        let outcome = session
            .add_user_flow(&UserForm::new("sowmya", "sowmya@abc.com", Some("30")))
            .await;
        assert_eq!(outcome, FlowOutcome::Completed);
        let actions = &session.page_mut().actions;
        assert!(actions.contains(&"fill css=input[placeholder*='age'] >> nth=0 = 30".to_string()));
        assert_eq!(actions.last().unwrap(), "click css=button:has-text('Create') >> nth=0");
    }

    #[tokio::test]
    async fn absent_age_leaves_the_field_untouched() {
        let mut session = UiSession::new(FakePage::showing(&form_fields()), &settings());
        let filled = session
            .fill_add_user_form(&UserForm::new("a", "a@b.co", None))
            .await
            .unwrap();
        assert!(filled);
        assert!(!session
            .page_mut()
            .actions
            .iter()
            .any(|a| a.contains("placeholder*='age'")));

        let mut session = UiSession::new(FakePage::showing(&form_fields()), &settings());
        session
            .fill_add_user_form(&UserForm::new("a", "a@b.co", Some("")))
            .await
            .unwrap();
        assert!(session
            .page_mut()
            .actions
            .contains(&"fill css=input[placeholder*='age'] >> nth=0 = ".to_string()));
    }

    #[tokio::test]
    async fn edit_flow_appends_updated() {
        let field = Locator::css("input[value]:not([value=''])").first();
        let mut page = FakePage::showing(&[
            Locator::title("Edit").first(),
            field.clone(),
            Locator::css("button:has-text('Update')").first(),
        ]);
        page.values.insert(field.to_string(), "sowmya".into());

        let mut session = UiSession::new(page, &settings());
        assert_eq!(session.edit_user_flow().await, FlowOutcome::Completed);
        assert_eq!(
            session.page_mut().values.get(&field.to_string()).map(String::as_str),
            Some("sowmyaupdated")
        );
        assert!(session.screenshots().captured().contains(&PathBuf::from("root/EditUser.png")));
    }

    #[tokio::test]
    async fn delete_flow_registers_policy_before_click() {
        let page = FakePage {
            dialog_message: Some(DELETE_CONFIRMATION.to_string()),
            ..Default::default()
        };
        let mut session = UiSession::new(page, &settings());
        session.delete_user_flow().await.unwrap();
        assert!(session.take_artifacts().contains(&PathBuf::from("root/DeleteUser.png")));
    }

    #[tokio::test]
    async fn delete_flow_rejects_unexpected_dialog() {
        let page = FakePage {
            dialog_message: Some("Discard changes?".to_string()),
            ..Default::default()
        };
        let mut session = UiSession::new(page, &settings());
        let err = session.delete_user_flow().await.unwrap_err();
        assert!(matches!(
            err,
            E2eError::Assertion(AssertionFailure { ref message, .. }) if message == "Delete confirmation message"
        ));
    }

    #[tokio::test]
    async fn delete_flow_without_dialog_fails() {
        let mut session = UiSession::new(FakePage::default(), &settings());
        let err = session.delete_user_flow().await.unwrap_err();
        assert_eq!(err.kind(), "ui");
    }

    #[tokio::test]
    async fn negative_scenario_requires_the_error_text() {
        let expected = "Email must contain @ symbol and be in valid format";
        let mut visible = form_fields();
        visible.push(Locator::text(expected).first());
        let mut session = UiSession::new(FakePage::showing(&visible), &settings());

        session
            .submit_invalid_user(
                "invalid_email",
                ("admin", "password123"),
                &UserForm::new("sowmya", "sowmyaabc.com", Some("30")),
                expected,
            )
            .await
            .unwrap();
        assert!(session
            .screenshots()
            .captured()
            .contains(&PathBuf::from("root/invalid_email_error.png")));

        let mut session = UiSession::new(FakePage::showing(&form_fields()), &settings());
        let err = session
            .submit_invalid_user(
                "invalid_email",
                ("admin", "password123"),
                &UserForm::new("sowmya", "sowmyaabc.com", Some("30")),
                expected,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains(expected));
    }

    #[tokio::test]
    async fn logout_requires_login_form_to_return() {
        let mut page = FakePage::showing(&[Locator::css("button:has-text('Logout')").first()]);
        page.fail_waits = true;
        let mut session = UiSession::new(page, &settings());
        assert!(matches!(session.logout_flow().await, FlowOutcome::Incomplete(_)));

        let page = FakePage::showing(&[
            Locator::css("button:has-text('Logout')").first(),
            password_input(),
        ]);
        let mut session = UiSession::new(page, &settings());
        assert!(session.logout_flow().await.is_completed());
    }
}
