//! Utility modules for ptcgp-fetch
//!
//! - `files`: image paths, directory layout and partial-file cleanup
//! - `http`: shared client, streamed downloads and the request limiter
//! - `retry`: backoff policy for primary-source requests

pub mod files;
pub mod http;
pub mod retry;
