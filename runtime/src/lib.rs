// Copyright 2026 Litterbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! litterbox — accessibility audits as a service.
//!
//! Fetches a page, loads it script-free into a request-scoped headless DOM
//! environment, runs axe-core against it and relays the report.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod renderer;
pub mod rest;

pub use config::ServiceConfig;
pub use engine::{AuditReport, EngineSource};
pub use error::{AuditError, AuditResult};
pub use pipeline::Auditor;
