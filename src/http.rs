//! HTTP cache protocol: pure request construction and the per-connection handler.

pub mod handler;
pub mod request;
