//! In-process store backend, used by the `memory` settings and by tests.

mod friend_request_repo_memory;
mod group_repo_memory;
mod invitation_cache_memory;
mod outbox_repo_memory;
mod user_repo_memory;

pub use friend_request_repo_memory::*;
pub use group_repo_memory::*;
pub use invitation_cache_memory::*;
pub use outbox_repo_memory::*;
pub use user_repo_memory::*;

mod repo_tx_memory;

pub use repo_tx_memory::*;
