//! Resolve a game character against the master reference datasets and
//! download its solo songs, profile voices and card voices, with an optional
//! `path|text` transcript manifest per character.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod reference;
pub mod select;
pub mod source;
