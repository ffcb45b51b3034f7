//! Domain layer - pure data types with no store access.
//!
//! This layer contains the core concepts of the data-access layer:
//! - Solar sites, coordinates and geo queries
//! - The key naming scheme
//! - Encoding of site records to and from hash fields
//!
//! All types in this layer are pure and easily testable.

pub mod keys;
pub mod schema;
pub mod site;
