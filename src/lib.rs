//! Shopfloor API
//!
//! Token lifecycle and role-gated staff administration for a supermarket
//! back office: password login, short-lived access tokens, rotating refresh
//! tokens, and an owner > manager > staff policy.

pub mod accounts;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod users;
