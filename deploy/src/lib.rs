//! leth - compile, bind and deploy Solidity contracts to configured networks.
//!
//! The deployment pipeline lives in [`pipeline`]. Chain access, compilation and
//! binding generation sit behind the traits in [`target`] and [`compiler`].

pub mod accounts;
pub mod artifacts;
pub mod compiler;
pub mod config;
mod error;
pub mod migrations;
pub mod pipeline;
pub mod project;
pub mod record;
pub mod target;

pub use error::{Error, Result};
pub use pipeline::{DeploymentReport, FailurePolicy, Pipeline};
pub use project::Project;
