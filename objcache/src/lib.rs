//! HTTP cache service: `GET|PUT|DELETE /cache/{key}` on top of an object store.

pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod utils;
