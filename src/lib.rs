//! Autoclerk: an office-automation assistant backend.
//!
//! An LLM agent with delegated access to Google Workspace. The crate wires
//! together four pieces: the OAuth2 authorization lifecycle (`auth`), the
//! Google capability tools (`tools`), the model provider (`llm`), and the
//! bounded tool-dispatch loop (`agent`), all fronted by a small HTTP API
//! (`server`).

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod tools;
