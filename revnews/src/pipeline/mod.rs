//! The retrieval-augmented generation pipeline.
//!
//! One chat turn flows: keyword stage -> conditional news retrieval ->
//! context assembly -> grounded answer. Feed personalization runs the
//! interest translator once per preference update instead.

pub mod chat;
pub mod context;
pub mod interest;
pub mod keywords;
pub mod spectrum;
