pub mod extractor;
pub mod parsing;
pub mod prompts;
pub mod service;

#[cfg(feature = "gemini")]
pub mod client;
#[cfg(feature = "gemini")]
pub mod types;

pub use extractor::*;
pub use parsing::*;
pub use service::*;

#[cfg(feature = "gemini")]
pub use client::*;
