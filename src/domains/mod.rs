//! Domains module containing business logic organized by bounded contexts.
//!
//! The server exposes a single domain: tools. Resources and prompts are not
//! served.

pub mod tools;
