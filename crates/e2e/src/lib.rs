//! Workbench E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E harness for the Workbench chat
//! application that:
//! - Optionally spawns the frontend/backend and waits for them to answer
//! - Drives a real browser through a long-lived Playwright bridge process
//! - Wraps each UI area in a page object whose flows return an [`Outcome`]
//! - Detects streamed chat replies by polling rendered text growth
//! - Calls the backend HTTP API directly for setup and cross-checks
//! - Aggregates performance samples into a report at teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 E2E Scenario Runner (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── DriverFactory::open() -> Arc<dyn Driver>  (1/scenario)│
//! │    ├── run(scenarios, filter) -> SuiteResult                │
//! │    └── teardown() -> performance report + results JSON      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioContext                                            │
//! │    ├── LoginPage / ChatPage / AdminPage ── Interactor       │
//! │    ├── StreamingDetector -> StreamingReport                 │
//! │    ├── ApiClient (bearer token, SSE)                        │
//! │    └── MetricsRecorder (run-scoped, drained once)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver                                                     │
//! │    ├── PlaywrightSession  (node bridge, JSON lines)         │
//! │    └── FakeDriver         (in-memory, for tests)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod driver;
pub mod error;
pub mod fake;
pub mod interaction;
pub mod locators;
pub mod metrics;
pub mod network;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod script;
pub mod server;
pub mod streaming;

pub use api::{AgentDescriptor, ApiClient, ApiResponse, SseTranscript};
pub use config::HarnessConfig;
pub use driver::{Driver, DriverFactory, WaitState};
pub use error::{ensure, skip, E2eError, E2eResult};
pub use interaction::{Interactor, Outcome};
pub use metrics::{MetricsRecorder, PerformanceReport};
pub use network::NetworkConditions;
pub use pages::{AdminPage, AgentKind, ChatPage, LoginPage, UserRole};
pub use runner::{Area, Scenario, ScenarioContext, ScenarioFilter, SuiteResult, TestRunner};
pub use script::FlowScript;
pub use streaming::{StreamingConfig, StreamingDetector, StreamingReport};
