pub mod agenda;
pub mod completion;
pub mod delivery;
pub mod error;
pub mod memory;
pub mod model;
pub mod notify;
pub mod preferences;
pub mod recurrence;
pub mod repository;
pub mod service;

pub use crate::service::{CareService, CareServiceBuilder};
