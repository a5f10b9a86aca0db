//! Neonmock Harness
//!
//! Answers a page's SQL-over-HTTP database traffic from an in-memory table
//! during browser end-to-end tests:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  page ──POST /sql──► FetchInterceptor                       │
//! │                        ├── EndpointMatcher (else Continue)  │
//! │                        ├── protocol::parse_body             │
//! │                        └── Scenario (exclusive section)     │
//! │                              ├── QueryRegistry::dispatch    │
//! │                              │     └── handler(&mut Table)  │
//! │                              └── encoder::encode            │
//! │  page ◄── { rows, fields, rowCount, command } ──────────────│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Statements are matched by exact text. An unmatched statement is a broken
//! mock, so it is reported with the offending SQL and never answered with
//! placeholder data.

pub mod config;
pub mod encoder;
pub mod handlers;
pub mod interceptor;
pub mod protocol;
pub mod registry;
pub mod scenario;
pub mod server;
pub mod spec;

pub use config::HarnessConfig;
pub use encoder::{encode, QueryResponse};
pub use interceptor::{
    EndpointMatcher, FetchInterceptor, InterceptedRequest, Interception, MockResponse, Phase,
};
pub use registry::{HandlerContext, Params, QueryHandler, QueryRegistry, QueryResult};
pub use scenario::{BatchError, Failure, Scenario, ScenarioBuilder};
pub use server::MockServer;
pub use spec::MockSpec;
