// src/lib.rs

//! modtool - module upgrade tool
//!
//! Upgrades an installed module to a newer release while respecting the
//! version requirements other installed modules place on it.
//!
//! # Architecture
//!
//! - Gate pipeline: every upgrade runs the same sequence of checks and
//!   always ends in a structured `UpgradeResult`
//! - Collaborators behind traits: local inventory, remote registry,
//!   resolver, archive fetcher and installer can each be swapped out
//! - Release metadata cached in SQLite between runs
//! - File-level change detection with SHA-256 checksums

pub mod config;
pub mod db;
mod error;
pub mod install;
pub mod inventory;
pub mod repository;
pub mod resolver;
pub mod upgrade;
pub mod version;

pub use error::{Error, Result};
pub use upgrade::{Collaborators, Outcome, UpgradeOptions, UpgradeResult, upgrade};
