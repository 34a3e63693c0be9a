//! # Scanlens
//!
//! Barcode product lookup with multi-source fallback and 24-hour caching.
//!
//! Given a barcode (food, medicine, or cosmetics), scanlens resolves
//! product data from three public upstream APIs, normalizes their
//! heterogeneous JSON into one UI model, and caches results. It ships as a
//! library plus one binary with two modes: a long-lived HTTP proxy server
//! (in-memory cache, CORS) and a one-shot CLI lookup (persistent on-disk
//! cache).
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ cache (24h TTL) ──miss──▶ resolver
//!                                        │ ordered by category hint
//!                    ┌───────────────────┼───────────────────┐
//!                    ▼                   ▼                   ▼
//!              Open Food Facts   Open Beauty Facts        OpenFDA
//!                    └────────── first hit wins ──▶ cache write
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`models`] | Normalized product model and result types |
//! | [`cache`] | TTL cache trait, in-memory and on-disk stores |
//! | [`providers`] | One adapter per upstream data source |
//! | [`resolver`] | Category-ordered fallback chain |
//! | [`server`] | Proxy HTTP API |
//! | [`scans`] | Scan-history persistence (hosted backend) |

pub mod cache;
pub mod config;
pub mod models;
pub mod providers;
pub mod resolver;
pub mod scans;
pub mod server;
