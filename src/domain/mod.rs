//! Domain layer containing the auth lifecycle types and profile model.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `auth` - Identity, sessions, lifecycle events and `AuthState`
//! - `profile` - User profile, subscription tiers and the AI context projection

pub mod auth;
pub mod foundation;
pub mod profile;
