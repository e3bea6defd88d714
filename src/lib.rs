//! Text bot back end: voice, image and document text sent through a
//! rotating pool of LLM API keys for correction, summaries and Q&A.
//!
//! * [`pool`] — credential rotation, retry and failover.
//! * [`llm`] — provider client, prompts and the text processor.
//! * [`config`] — TOML settings and paths.
//! * [`session`] — in-memory per-user state.
//! * [`text`] — length heuristics and token estimates.
//! * [`export`] — `.txt` / `.pdf` export.

pub mod config;
pub mod export;
pub mod llm;
pub mod pool;
pub mod session;
pub mod text;
