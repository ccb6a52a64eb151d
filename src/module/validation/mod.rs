//! Module validation framework
//!
//! Checks imported module files against the module contract.

pub mod contract_validator;

pub use contract_validator::{ContractValidator, ValidatedModule};
