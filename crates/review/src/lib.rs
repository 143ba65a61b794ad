//! Pull request review bot for Gitee.
//!
//! Reviewers gate a pull request with comment commands (`/lgtm`, `/approve`,
//! their `cancel` forms and `/check-pr`). The bot turns those commands into
//! labels and merges the PR once its labels satisfy the repository policy,
//! it has no conflicts, and its target branch is not frozen.
//!
//! # Modules
//!
//! - [`labels`]: required and forbidden label policy
//! - [`freeze`]: branch freeze documents and owner exemptions
//! - [`trust`]: who may issue gating commands
//! - [`merge`]: merge verdict and merge action
//! - [`bot`]: per-event handlers
//! - [`server`]: webhook endpoint

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bot;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod freeze;
pub mod labels;
pub mod merge;
pub mod server;
pub mod trust;

pub use bot::Robot;
pub use config::{BotConfig, Configuration};
pub use error::{MultiError, ReviewError, ReviewResult};
pub use merge::{MergeHelper, Trigger, Verdict};
