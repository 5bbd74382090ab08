#![allow(dead_code)]

pub mod sut_stub;

use std::time::Duration;

use serde_json::Value;

use usermgmt_e2e::config::resource_path;
use usermgmt_e2e::{FixtureStore, HarnessContext, HarnessSettings};

pub use sut_stub::StubSut;

/// Harness context aimed at `stub`, using the shipped fixtures
pub fn context(stub: &StubSut) -> HarnessContext {
    let fixtures = FixtureStore::load(&resource_path("Testdata.json")).expect("shipped fixtures");
    context_with(stub, fixtures)
}

/// Harness context aimed at `stub` with the given fixtures
pub fn context_with(stub: &StubSut, fixtures: FixtureStore) -> HarnessContext {
    let mut settings = HarnessSettings::for_backend(stub.base_url(), stub.port());
    settings.case_timeout = Duration::from_secs(30);
    HarnessContext::new(settings, fixtures)
}

/// The shipped fixtures with `section` replaced by `rows`
pub fn fixtures_with(section: &str, rows: Value) -> FixtureStore {
    let content = std::fs::read_to_string(resource_path("Testdata.json")).expect("shipped fixtures");
    let mut document: Value = serde_json::from_str(&content).expect("fixture json");
    document[section] = rows;
    FixtureStore::from_json_str(&document.to_string()).expect("patched fixtures")
}
