//! Suite setup and the federation scenario catalog
//!
//! The `fedsuite` binary logs in to every configured instance, prepares the
//! federation topology with [`setup::setup_suite`], runs the scenarios from
//! [`scenarios::catalog`] and sweeps the instances afterwards.

pub mod scenarios;
pub mod setup;

pub use scenarios::catalog;
pub use setup::{setup_suite, SuiteSetup};
