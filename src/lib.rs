//! # grant-match
//!
//! Grant ingestion and SME-to-grant match scoring.
//!
//! Grant documents are summarized by a completion model, stored, and indexed
//! for keyword search. A match request takes a company profile and free-text
//! goals, retrieves candidate grants, has the model judge eligibility for
//! each, and returns the best-scoring few. Questions about a single grant
//! are answered from its stored record and indexed text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │   Ingest     │──▶│ RecordStore  │   │ DocumentSearch │
//! │ extract+sum. │──▶│  (grants)    │   │  FTS5 / OS     │
//! └──────────────┘   └──────▲───────┘   └───────▲────────┘
//!                           │ matches           │ candidates
//!                    ┌──────┴───────────────────┴──┐
//!                    │  Matcher: intent → judge →  │
//!                    │  score → rank → persist     │
//!                    └──────▲──────────────▲───────┘
//!                           │              │
//!                      ┌────┴───┐     ┌────┴───┐
//!                      │  CLI   │     │  HTTP  │
//!                      └────────┘     └────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`completion`] | Completion provider abstraction (OpenAI, Ollama) |
//! | [`prompts`] | Prompt templates |
//! | [`intent`] | Goal-intent extraction |
//! | [`retrieve`] | Candidate retrieval |
//! | [`judge`] | Eligibility judgment |
//! | [`score`] | Fit scoring |
//! | [`rank`] | Ranking and match persistence |
//! | [`matcher`] | Pipeline orchestration and shared context |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`ingest`] | Grant summarization and indexing (documents, text, URLs) |
//! | [`ask`] | Question answering over one grant |
//! | [`search`] | Search backends (SQLite FTS5, OpenSearch) |
//! | [`store`] | Record storage (SQLite, in-memory) |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod ask;
pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod extract;
pub mod ingest;
pub mod intent;
pub mod judge;
pub mod matcher;
pub mod migrate;
pub mod models;
pub mod prompts;
pub mod rank;
pub mod retrieve;
pub mod score;
pub mod search;
pub mod server;
pub mod store;
