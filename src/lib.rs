//! Ratekeeper - Distributed Rate Limiting Middleware
//!
//! This crate implements sliding-window rate limiting for axum services. Counters
//! and the rate limit configuration live in a key/value store shared by every
//! instance of a deployment, so limits hold across the fleet. Each instance
//! keeps a process-local copy of the configuration that a background task
//! refreshes, and exposes admin routes to read and change it at runtime.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
