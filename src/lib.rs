//! Client library for the ThesisAI review platform.
//!
//! This crate implements:
//! - A typed REST client for auth, thesis management, user
//!   administration, and supervisor feedback
//! - The streaming AI-feedback pipeline: chunk decoding, frame
//!   splitting, event classification, incremental markdown rendering,
//!   and session lifecycle with cancellation
//! - Post-stream persistence of the assembled feedback document


mod utils;

pub mod client;
pub mod config;
pub mod decoder;
pub mod display;
pub mod events;
pub mod render;
pub mod session;
pub mod streaming;
pub mod types;

pub use client::ApiClient;
pub use display::{FeedbackSink, SessionState, TerminalSink};
pub use render::{HtmlDocumentSink, MarkdownRenderer};
pub use session::FeedbackSession;
pub use types::*;
