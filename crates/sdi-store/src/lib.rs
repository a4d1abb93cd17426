//! # sdi-store: Network Model Store
//!
//! The canonical relational form of a storm drain network, kept in a single
//! SQLite file. Table names follow the layout the host application and the
//! simulator export expect (`user_swmm_nodes`, `user_swmm_conduits`,
//! `swmmflort`, `swmmflo`, ...).
//!
//! All access goes through [`Store`]. Lower-level row functions take a
//! `&Connection` so that the store can compose several of them inside one
//! transaction.
//!
//! Change notification is pull-based: every write bumps a per-table
//! counter that callers poll with [`Store::version`].

pub mod error;
mod integrity;
mod links;
mod nodes;
mod rename;
pub mod schema;
pub mod schematized;
mod store;
mod tables;

pub use error::{StoreError, StoreResult};
pub use schematized::{OutflowCell, OutflowRole, SchematizedInlet, SchematizedOutfall};
pub use store::Store;

#[cfg(test)]
mod tests;
