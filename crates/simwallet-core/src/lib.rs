//! # simwallet-core
//! Chain types, collaborator traits, and reference collaborators for the
//! simulated wallet.

pub mod address;
pub mod codec;
pub mod constants;
pub mod error;
pub mod keys;
pub mod traits;
pub mod types;
