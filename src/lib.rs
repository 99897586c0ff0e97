//! # LocalMind
//!
//! A small retrieval-augmented question-answering pipeline for a folder of
//! company documents.
//!
//! Documents are split into overlapping character windows, embedded, and
//! stored in a vector store. A question is embedded the same way, its
//! nearest chunks are retrieved, and a language model answers from those
//! chunks only, citing them as sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Data dir    │──▶│  Ingestion   │──▶│ Vector store │
//! │ docx/pdf/md │   │ Chunk+Embed  │   │ SQLite / pg  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │ nearest
//!                                     ┌──────▼───────┐   ┌─────────┐
//!                                     │ Answer svc   │──▶│   LLM   │
//!                                     │ prompt build │◀──│ (Ollama)│
//!                                     └──────┬───────┘   └─────────┘
//!                          ┌─────────────────┤
//!                          ▼                 ▼
//!                     ┌──────────┐     ┌──────────┐
//!                     │   CLI    │     │   HTTP   │
//!                     │  loop    │     │ POST /ask│
//!                     └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! localmind init                 # create the store and data directory
//! localmind ingest               # index ./data/docs
//! localmind cli                  # ask questions interactively
//! localmind api                  # serve POST /ask
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`error`] | Library error type |
//! | [`chunk`] | Overlapping character-window chunker |
//! | [`extract`] | Text extraction from docx/pdf/txt/md |
//! | [`connector_fs`] | Data directory scanner |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store abstraction and backends |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieval`] | Question → nearest chunks |
//! | [`prompt`] | Grounded prompt construction |
//! | [`llm`] | Streaming LLM backend |
//! | [`answer`] | Question answering service |
//! | [`repl`] | Interactive loop |
//! | [`server`] | HTTP API |
//! | [`context`] | Runtime wiring of the above |
//! | [`db`] / [`migrate`] | SQLite connection and schema |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod repl;
pub mod retrieval;
pub mod server;
pub mod stats;
pub mod store;
