//! CRM Qualification API Library
//!
//! Companies and leads are scored against the Ideal Customer Profile on every
//! write, and outbound email workflows are forwarded to an n8n automation
//! engine, with personalization responses memoized for a short TTL.
//!
//! # Modules
//!
//! - `automation_client`: n8n webhook client (personalize, send, DNS, OAuth).
//! - `cache`: TTL response cache with structured keys.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Record, input and request models.
//! - `personalization`: Cached personalization workflow.
//! - `qualification`: ICP scorer.
//! - `store`: Record store operations for companies and leads.
//! - `validation`: Email and domain checks.

pub mod automation_client;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod personalization;
pub mod qualification;
pub mod store;
pub mod validation;
