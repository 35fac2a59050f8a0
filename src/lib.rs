//! coursedrop - checkout relay and single-use download links for a paid course
//!
//! A confirmed Stripe payment records an order and mints a download token;
//! the buyer's link can be checked any number of times and redeemed once.

pub mod config;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod tokens;
pub mod util;
