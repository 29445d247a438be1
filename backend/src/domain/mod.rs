//! # Domain Module
//!
//! Business rules of the points backend.
//!
//! - **Point ledger** ([`point_ledger`]): the award rate limit and the
//!   retraction gate, the heart of the system
//! - **Services**: children, users, presence and one-off admin maintenance
//! - **Models**: typed entities handed between storage and the REST layer
//!
//! Services only talk to storage through the traits in
//! [`crate::storage::traits`] and never keep state between calls.

pub mod admin_service;
pub mod age;
pub mod auth;
pub mod child_service;
pub mod dates;
pub mod error;
pub mod models;
pub mod point_ledger;
pub mod presence_service;
pub mod user_service;

pub use admin_service::AdminService;
pub use child_service::ChildService;
pub use error::{ServiceError, ServiceResult};
pub use point_ledger::{EntityKind, LedgerConfig, LedgerError, PointLedger, RetractionPolicy};
pub use presence_service::PresenceService;
pub use user_service::UserService;
