//! Convoke, a rate-limit-aware bulk membership runner.
//!
//! Feeds an ordered roster of handles through an external identity resolver
//! and membership API, paced by an adaptive delay controller. Transient rate
//! limits are retried exactly once; accounts that cannot be added directly
//! are offered an invite link instead; every run ends in a diagnostic report.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod engine;
pub mod logging;
pub mod roster;
pub mod sim;
pub mod types;
