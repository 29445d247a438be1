//! Conversions between the `shared` DTOs and domain models.

pub mod child_mapper;
pub mod point_mapper;
pub mod presence_mapper;
pub mod user_mapper;

pub use child_mapper::ChildMapper;
pub use point_mapper::PointMapper;
pub use presence_mapper::PresenceMapper;
pub use user_mapper::UserMapper;
