//! HTTP API: routing, request/response mapping and actor resolution.

pub mod app;
pub mod context;
pub mod middleware;
