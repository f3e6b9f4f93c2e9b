pub mod anthropic;
pub mod error;
pub mod generator;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use error::GenerationError;
pub use generator::{Generated, Generator};
pub use provider::LlmProvider;
