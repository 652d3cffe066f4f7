// store

mod invitation_cache;

pub use invitation_cache::*;

// repo

mod friend_request_repo;
mod group_repo;
mod outbox_repo;
mod user_repo;

mod repo_tx;

pub use friend_request_repo::*;
pub use group_repo::*;
pub use outbox_repo::*;
pub use user_repo::*;

pub use repo_tx::*;
