pub mod actions;
pub mod error;
pub mod feed;
pub mod llm;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod sessions;

pub use error::Error;
