//! # Storage Module
//!
//! Persistence for children, points, users and presence records.
//!
//! ## Current Implementation
//!
//! - **Primary Storage**: SQLite through SQLx, schema created at startup
//! - **Repositories**: one per table, each implementing a trait from [`traits`]
//! - **Tests**: every test opens its own in-memory database
//!
//! The domain layer only sees the traits, which keeps the point ledger
//! independent of the concrete database.

pub mod connection;
pub mod repositories;
pub mod traits;

pub use connection::DbConnection;
pub use repositories::{ChildRepository, PointRepository, PresenceRepository, UserRepository};
pub use traits::{ChildStorage, DuplicateChildName, PointStorage, PresenceStorage, UserStorage};
