//! LLM Provider implementations for deepresearch.
//!
//! All providers implement the `deepresearch_core::Provider` trait.
//! [`build_from_config`] picks the backend named in configuration and wraps
//! it in a [`RetryProvider`] for transient failures.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
pub use router::build_from_config;
