//! Linkgate - Request gatekeeping for a short-link REST backend
//!
//! This crate implements the layer that sits in front of the short-link API:
//! a shared-secret credential verifier for `Authorization: Basic` headers and
//! a per-route, per-client fixed-window rate limiter, plus the axum
//! middleware that wires both into a request pipeline.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
