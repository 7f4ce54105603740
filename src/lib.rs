//! stampa: a small HTTP service that converts HTML documents to PDF by
//! delegating to an external rendering engine.
//!
//! The crate is organized in three layers. [`domain`] holds the value
//! types that cross layer boundaries. [`application`] owns the conversion
//! pipeline: payload validation, per-request scratch files, and the
//! bounded engine subprocess. [`infra`] provides the HTTP surface,
//! telemetry, and startup error types; [`config`] resolves layered
//! settings once at startup.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
