//! Game forum backend library.
//!
//! A REST/JSON service for a gaming community: game catalog, ratings,
//! publisher reviews, comment threads, forum topics and user profiles, with
//! bearer token authentication and a role based access policy.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forum;
pub mod web;
