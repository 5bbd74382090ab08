//! User-management E2E Test Harness
//!
//! This crate drives a running user-management service end to end:
//! - Resolves settings from `config.properties` plus overrides
//! - Loads fixtures from `Testdata.json`
//! - Calls the REST API through a token-carrying client
//! - Controls Playwright through a JSON-lines bridge for the browser flows
//! - Runs suites with hooks, priorities and data providers, writing
//!   `test-results.json`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   E2E Test Runner (Rust)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── register(Suite<S>)                                   │
//! │    ├── run_all() / run_tagged(tag) / run_suite(name)        │
//! │    └── write_results(report) -> test-results.json           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suite<S>                                                   │
//! │    ├── before_all -> S, before_each, after_each, after_all  │
//! │    ├── providers: name -> [[Value]]                         │
//! │    └── cases: [Case { name, priority, data?, body }]        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ApiClient (reqwest)          UiDriver (node + playwright)  │
//! │    ├── authenticate / login     ├── BrowserSession          │
//! │    ├── users CRUD               └── UiSession<PageDriver>   │
//! │    └── health_check                   ├── login / logout    │
//! │                                       └── add/edit/delete   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ConfigSource -> HarnessSettings     FixtureStore -> User   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod model;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod server;
pub mod suite;
pub mod suites;
pub mod ui;
pub mod verify;

pub use api::{ApiClient, ApiResponse};
pub use config::{ConfigSource, HarnessSettings};
pub use error::{E2eError, E2eResult};
pub use fixtures::FixtureStore;
pub use model::{Credentials, User};
pub use runner::{RunReport, TestRunner};
pub use suite::{Case, CaseFilter, CaseParams, HarnessContext, Suite, SuiteState};
