pub mod models;
pub mod policy;
pub mod handlers;
pub mod router;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use models::*;
pub use policy::{ClinicPolicy, PolicyError, TimeWindow};
pub use router::*;
