//! Test data provider
//!
//! `Testdata.json` is parsed once and validated; every accessor hands out a
//! fresh copy so cases can mutate their fixtures freely.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::resource_path;
use crate::error::{E2eError, E2eResult};
use crate::model::{Credentials, User, UserFields};

/// Environment variable pointing at an alternative fixture document
pub const TESTDATA_PATH_ENV: &str = "USERMGMT_TESTDATA";

/// Fewest valid users the suites rely on
pub const MIN_VALID_USERS: usize = 3;

static GLOBAL: OnceCell<FixtureStore> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct FixtureStore {
    document: Value,
}

impl FixtureStore {
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| E2eError::fixture("<document>", format!("{}: {}", path.display(), e)))?;
        debug!("Loading fixtures from: {}", path.display());
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> E2eResult<Self> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| E2eError::fixture("<document>", e.to_string()))?;
        let store = Self { document };
        store.validate()?;
        Ok(store)
    }

    /// The process-wide instance, loaded from the default resource on first use
    pub fn global() -> E2eResult<&'static FixtureStore> {
        GLOBAL.get_or_try_init(|| FixtureStore::load(&default_testdata_path()))
    }

    /// Install the process-wide instance. Fails if one is already in use.
    pub fn install(store: FixtureStore) -> E2eResult<&'static FixtureStore> {
        GLOBAL
            .set(store)
            .map_err(|_| E2eError::fixture("<document>", "fixtures already initialized"))?;
        GLOBAL
            .get()
            .ok_or_else(|| E2eError::fixture("<document>", "fixtures not initialized"))
    }

    fn validate(&self) -> E2eResult<()> {
        let valid = self.valid_users()?;
        if valid.len() < MIN_VALID_USERS {
            return Err(E2eError::fixture(
                "validUsers",
                format!("expected at least {} users, found {}", MIN_VALID_USERS, valid.len()),
            ));
        }
        self.valid_credentials()?;
        Ok(())
    }

    pub fn valid_users(&self) -> E2eResult<Vec<User>> {
        self.section("validUsers")
    }

    /// Free-form records: keys and value types are kept exactly as written
    pub fn invalid_users(&self) -> E2eResult<Vec<UserFields>> {
        self.section("invalidUsers")
    }

    pub fn update_user_data(&self) -> E2eResult<Vec<UserFields>> {
        self.section("updateUserData")
    }

    pub fn patch_user_data(&self) -> E2eResult<Vec<UserFields>> {
        self.section("patchUserData")
    }

    pub fn valid_credentials(&self) -> E2eResult<Credentials> {
        self.section("authData.validCredentials")
    }

    pub fn invalid_credentials(&self) -> E2eResult<Vec<Credentials>> {
        self.section("authData.invalidCredentials")
    }

    /// Raw section by dotted path
    pub fn raw(&self, path: &str) -> E2eResult<Value> {
        path.split('.')
            .try_fold(&self.document, |node, key| node.get(key))
            .cloned()
            .ok_or_else(|| E2eError::fixture(path, "section missing"))
    }

    fn section<T: DeserializeOwned>(&self, path: &str) -> E2eResult<T> {
        let value = self.raw(path)?;
        serde_json::from_value(value).map_err(|e| E2eError::fixture(path, e.to_string()))
    }
}

/// Default location of `Testdata.json`
pub fn default_testdata_path() -> PathBuf {
    std::env::var(TESTDATA_PATH_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| resource_path("Testdata.json"))
}
