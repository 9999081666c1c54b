//! # lexassist
//!
//! Legal document helpers served over a CLI and a JSON HTTP API: clause risk
//! classification, chunked summaries, case-law retrieval with generated
//! advice, statute scraping, legal news, will drafting, a lawyer directory
//! and an IVR assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Corpus    │──▶│ Chunk+Embed  │──▶│  SQLite   │
//! │ PDF/DOCX/MD │   │  (index)     │   │ chunk_vec │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │ VectorStore
//!             ┌──────────────┬───────────────┤
//!             ▼              ▼               ▼
//!       ┌──────────┐  ┌────────────┐  ┌────────────┐
//!       │Classifier│  │ Summarizer │  │  Advisor   │──▶ TextGenerator
//!       └──────────┘  └────────────┘  └────────────┘
//!             └──────────────┴───────┬───────┘
//!                         ┌──────────┴─────────┐
//!                         ▼                    ▼
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexassist init
//! lexassist index build
//! lexassist predict "The tenant shall pay a penalty of 50% per day."
//! lexassist search "minimum wages" --k 3
//! lexassist serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`preprocess`] | Text cleanup and clause splitting |
//! | [`chunk`] | Paragraph and word chunking |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`corpus`] | Corpus directory scanner |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`classifier`] | Clause risk classifier |
//! | [`llm`] | Text generation providers |
//! | [`summarize`] | Chunked summarization |
//! | [`store`] | Vector store (SQLite, in-memory) |
//! | [`index`] | Index builder |
//! | [`advice`] | Retrieval, advice and comparison |
//! | [`news`] | Legal news client |
//! | [`scraper`] | Statute site scraper |
//! | [`will`] | Will drafting |
//! | [`lawyers`] | Lawyer directory |
//! | [`assistant`] | IVR assistant |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI command runners |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod advice;
pub mod assistant;
pub mod chunk;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod index;
pub mod lawyers;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod news;
pub mod preprocess;
pub mod scraper;
pub mod server;
pub mod store;
pub mod summarize;
pub mod will;
