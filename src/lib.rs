//! # QA Agent
//!
//! A retrieval-augmented QA assistant. Product documents (PDF, Markdown,
//! text, JSON, HTML) are split into overlapping chunks, embedded and stored
//! in an on-disk knowledge base. Test-case requests and script requests
//! retrieve the most similar chunks and hand them to a language model as
//! grounding context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Uploads  │──▶│  Pipeline   │──▶│ Knowledge    │
//! │ PDF/MD/… │   │ Chunk+Embed │   │ base (SQLite)│
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │ top-k
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!                ┌───────────┐      ┌───────────┐
//!                │ Test-case │      │  Script   │──▶ LLM
//!                │  prompt   │      │  prompt   │
//!                └───────────┘      └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qa-agent ingest ./docs/specs.md ./docs/checkout.html
//! qa-agent ask "Generate test cases for the discount code feature"
//! qa-agent script "TC-001: apply SAVE15" --html ./docs/checkout.html
//! qa-agent serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | Per-format text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Knowledge base persistence and similarity search |
//! | [`ingest`] | Ingestion pipeline |
//! | [`llm`] | Language model clients |
//! | [`prompt`] | Prompt templates |
//! | [`agent`] | Service facade used by the CLI and server |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod agent;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod server;
pub mod store;
