mod friendship_service_impl;
mod group_service_impl;
mod invitation_code;
mod token_verifier_fake;
mod token_verifier_jwt;
mod user_service_impl;

pub use friendship_service_impl::*;
pub use group_service_impl::*;
pub use invitation_code::*;
pub use token_verifier_fake::*;
pub use token_verifier_jwt::*;
pub use user_service_impl::*;
