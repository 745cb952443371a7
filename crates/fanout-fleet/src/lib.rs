//! fanout-fleet: Fleet-group host resolution
//!
//! Turns a named group of machines (such as a cloud auto-scaling group) into
//! the list of addresses the engine should contact.

pub mod aws;
pub mod error;
pub mod resolver;

pub use aws::AwsCliResolver;
pub use error::FleetError;
pub use resolver::{FleetMember, HostSetResolver, RUNNING_STATE, running_addresses};
