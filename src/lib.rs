//! Symbiote is a terminal-first assistant that multiplexes an LLM chat
//! session with a catalog of inline analytic commands.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns runtime state: the settings record, the session memory
//!   store, the conversation buffer, the role table, and the REPL kernel
//!   that drives each turn.
//! - [`backend`] routes `"<backend>:<model>"` identifiers to adapters that
//!   speak the OpenAI, Ollama, and Groq wire protocols over a unified
//!   streaming interface.
//! - [`commands`] recognizes `name::` / `name:arg:` tokens in user input
//!   and dispatches them to handlers whose output is spliced back into the
//!   prompt, stored in memory, or written to the transcript.
//! - [`session`] reads multi-line input with history and completion and
//!   keeps the bottom status toolbar fresh from a background thread.
//! - [`ui`] renders panels, tables, markdown replies, the pager, and the
//!   file-browser overlay.
//! - [`server`] exposes the optional HTTP `/chat` endpoint.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`), which
//! parses CLI flags and hands control to [`core::kernel::Kernel`].

pub mod api;
pub mod backend;
pub mod commands;
pub mod core;
pub mod server;
pub mod session;
pub mod ui;
pub mod utils;

/// Crate-wide error alias; handlers and adapters propagate with `?` and the
/// kernel translates at the turn boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
