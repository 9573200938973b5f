//! Multimodal conversation relay
//!
//! Accepts a prompt, an optional image, a persona and the prior conversation,
//! rebuilds the multi-turn conversation, and forwards it to a generative
//! language provider, returning its text answer in a stable JSON shape.

pub mod ai;
pub mod app;
pub mod assembler;
pub mod error;
pub mod gateway;
pub mod history;
pub mod image;
pub mod models;
pub mod prompts;
pub mod response;
pub mod server;

pub use error::{Error, Result};
