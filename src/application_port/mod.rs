mod auth_service;
mod friendship_service;
mod group_service;
mod user_service;

pub use auth_service::*;
pub use friendship_service::*;
pub use group_service::*;
pub use user_service::*;
