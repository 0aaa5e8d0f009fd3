//! Lookup pipeline for the pronoun daemon: configuration, identity resolution, per-user pronoun
//! files and the one-line TCP protocol that ties them together.

pub mod bounded;
pub mod config;
pub mod identity;
pub mod pronouns;
pub mod server;
