//! Solar Advisor API Library
//!
//! Backend for a solar-equipment recommendation service: callers submit a
//! list of appliances, the service resolves their location, acquires solar
//! conditions, sizes the load, asks a generative-AI model for a priced
//! system recommendation, validates the result against pricing/sizing
//! heuristics, and records it to the user's bounded history.
//!
//! # Modules
//!
//! - `ai_client`: Gemini generation client.
//! - `cache_validator`: checksummed cache envelope for upstream responses.
//! - `circuit_breaker`: circuit breaker for the AI upstream.
//! - `config`: configuration management.
//! - `db`: database connection, pool and schema.
//! - `errors`: error handling types.
//! - `handlers`: HTTP request handlers and shared state.
//! - `history`: bounded per-user history storage.
//! - `load`: appliance load aggregation.
//! - `location`: location resolution and address enrichment.
//! - `models`: core data models.
//! - `recommendation`: prompt construction and AI-output parsing.
//! - `services`: external service clients (geocoding, IP lookup, weather).
//! - `validator`: pricing and component-sizing sanity checks.
//! - `weather`: solar-conditions acquisition with fallbacks.

pub mod ai_client;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod load;
pub mod location;
pub mod models;
pub mod recommendation;
pub mod services;
pub mod validator;
pub mod weather;
