//! # Intel Hub
//!
//! Configurable, AI-assisted industry intelligence reports.
//!
//! A *configuration set* lists information sources and focus keywords. For a
//! set, Intel Hub asks a generative search provider (Gemini with Google
//! Search) for a Markdown report, reconciles the links it cites into one
//! de-duplicated reference list, archives the report and optionally delivers
//! it to a webhook.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────────────┐
//! │ CLI ihub │──▶│   Hub    │──▶│ GenerationProvider │
//! │ HTTP API │   │          │   └─────────┬──────────┘
//! └──────────┘   │          │             ▼
//!                │          │   report::assemble → citation::reconcile
//!                │          │──▶ WebhookSender
//!                │          │──▶ ConfigStore / ReportArchive (SQLite kv)
//!                └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ihub init                         # create database, seed default set
//! ihub configs list
//! ihub sources add default-set --name Wired --url https://wired.com
//! ihub import default-set sources.xlsx --suggest
//! ihub generate                     # report for the active set
//! ihub reports latest
//! ihub serve                        # JSON API for a dashboard
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`citation`] | Grounding + inline link reconciliation |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Persisted records |
//! | [`prompt`] | Provider instruction text |
//! | [`provider`] | Generation provider abstraction (Gemini) |
//! | [`report`] | Report assembly |
//! | [`suggest`] | Focus-keyword suggestion |
//! | [`import`] | JSON / CSV / XLSX / XLS source import |
//! | [`webhook`] | Report delivery |
//! | [`store`] | Config store and report archive |
//! | [`hub`] | Operations layer |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod citation;
pub mod config;
pub mod db;
pub mod hub;
pub mod import;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod report;
pub mod server;
pub mod store;
pub mod suggest;
pub mod webhook;
