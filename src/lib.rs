//! Course materials question answering: retrieval over course documents
//! plus a tool-using language model, served over HTTP.

pub mod assistant;
pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;
