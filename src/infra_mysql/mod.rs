mod friend_request_repo_mysql;
mod group_repo_mysql;
mod outbox_repo_mysql;
mod user_repo_mysql;

pub use friend_request_repo_mysql::*;
pub use group_repo_mysql::*;
pub use outbox_repo_mysql::*;
pub use user_repo_mysql::*;

mod repo_tx_mysql;

pub use repo_tx_mysql::*;

mod util;
