// src/lib.rs

//! Veille: content-watch ingestion core.
//!
//! Polls configured sources (feeds, JSON APIs, HTML pages), tracks content
//! changes per URL and raises alerts for users whose watches match.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
