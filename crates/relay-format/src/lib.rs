//! # relay-format
//!
//! Token-substitution formatting for [`relay_core::LogMessage`].
//!
//! Templates carry `{name}` or `{name:subformat}` tokens. [`TemplateEngine`]
//! renders them in [`OutputFormat::Text`] mode, or emits a fixed-shape JSON
//! object in [`OutputFormat::Json`] mode regardless of template content.
//!
//! Formatting is deterministic: the same message, mode, and template always
//! produce the same bytes. The only live input is `{memoryMB}`, read through a
//! replaceable [`MemoryProbe`].

#![deny(unsafe_code)]

pub mod engine;
pub mod json;
pub mod memory;

pub use engine::{DEFAULT_TEMPLATE, OutputFormat, TemplateEngine};
pub use json::{escape_json, to_json_line};
pub use memory::{FixedMemoryProbe, MemoryProbe, SystemMemoryProbe};
