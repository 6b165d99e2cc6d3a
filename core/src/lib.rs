//! Fraud risk-scoring and decision core for the call exchange.
//!
//! The routing and bidding services call [`orchestrator::FraudOrchestrator`]
//! in-process for every call, bid and account event. Signal providers and
//! stores sit behind the traits in [`signal`] and [`store`].

pub mod check_result;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod denylist;
pub mod entity;
pub mod error;
pub mod features;
pub mod orchestrator;
pub mod risk_profile;
pub mod rng;
pub mod rule_engine;
pub mod rules;
pub mod score_cache;
pub mod signal;
pub mod store;
pub mod traffic;
pub mod types;
pub mod velocity;
