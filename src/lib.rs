//! Rapport Session Core - authentication and session lifecycle
//!
//! This crate owns the signed-in user's `AuthState` for the Rapport
//! relationship-coaching platform: it restores and renews sessions, fetches
//! or creates the user's profile, keeps the AI personalisation context in
//! sync, listens for server-pushed profile changes, and fans every state
//! change out to subscribers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
