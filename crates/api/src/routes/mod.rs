//! HTTP and WebSocket handlers

pub mod alerts;
pub mod ingest;
pub mod readings;
pub mod stream;
