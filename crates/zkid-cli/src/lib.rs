//! # zkid-cli: Command-Line Interface
//!
//! ## Subcommands
//!
//! - `zkid demo`: the authorization flow end to end, in one process.
//! - `zkid identity create`: derive an identity, deterministically with
//!   `--seed`.
//! - `zkid circuits setup`: write mock circuit artifacts to a directory.
//!
//! ```bash
//! zkid -v demo
//! zkid identity create --seed $(printf '01%.0s' {1..32})
//! ZKID_CIRCUITS_PATH=./circuits zkid circuits setup
//! ```

pub mod circuits;
pub mod config;
pub mod demo;
pub mod identity;
