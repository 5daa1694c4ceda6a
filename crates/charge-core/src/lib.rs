//! Core domain + application logic for the campus charging-port bot.
//!
//! This crate is framework-agnostic. Telegram lives in an adapter crate; the vendor
//! API sits behind the `StatusSource` port.

pub mod cache;
pub mod command;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod fetcher;
pub mod formatting;
pub mod logging;
pub mod report;
pub mod service;
pub mod topology;
pub mod upstream;

pub use errors::{Error, Result};
