//! # REST API Interface Layer
//!
//! HTTP endpoints of the points backend. This layer only translates: it
//! extracts and deserializes requests, calls the domain services, maps the
//! results onto the `shared` DTOs and turns domain errors into status codes
//! (see [`error::ApiError`]).
//!
//! Every route except `/`, `/login`, `/register` and the uploaded avatars
//! requires a bearer token, checked by [`middleware::require_auth`].

pub mod admin_apis;
pub mod child_apis;
pub mod error;
pub mod extract;
pub mod mappers;
pub mod middleware;
pub mod point_apis;
pub mod presence_apis;
pub mod user_apis;

pub use admin_apis::*;
pub use child_apis::*;
pub use error::ApiError;
pub use middleware::{require_auth, AuthenticatedUser};
pub use point_apis::*;
pub use presence_apis::*;
pub use user_apis::*;
