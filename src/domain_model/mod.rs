mod friend_request;
mod group;
mod session;
mod stream;
mod user;

pub use friend_request::*;
pub use group::*;
pub use session::*;
pub use stream::*;
pub use user::*;
