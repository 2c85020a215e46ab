//! Core logic for the campus announcement bot.
//!
//! This crate is framework-agnostic: the chat platform lives behind
//! `messaging::port::MessagingPort`, implemented in adapter crates.

pub mod announcement;
pub mod chunking;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod fetcher;
pub mod logging;
pub mod messaging;
pub mod render;
pub mod service;
pub mod watcher;
pub mod watermark;

pub use errors::{Error, Result};
