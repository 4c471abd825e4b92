//! # dojo-retrieval
//!
//! Turns a live question into knowledge-base context for the assistant.
//!
//! [`RetrievalService`] embeds the query, runs a tenant-scoped similarity
//! search and renders the hits as numbered, attributed blocks. Failures
//! never reach the caller: a live conversation carries on with the
//! [`RETRIEVAL_FAILED`] sentinel instead.
//!
//! ```text
//! [Document 1 - document: pricing.pdf] (relevance: 91.20%)
//! Enterprise tier starts at 50 seats...
//! ```

pub mod service;

pub use service::{
    ConversationTurn, NO_KNOWLEDGE_FOUND, RETRIEVAL_FAILED, RetrievalConfig, RetrievalService,
    format_context, render_prompt,
};
