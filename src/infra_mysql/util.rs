use super::repo_tx_mysql::MySqlTx;
use crate::domain_port::*;
use sqlx::mysql::MySqlDatabaseError;

pub fn mysql_tx(tx: &mut dyn StorageTx) -> anyhow::Result<&mut MySqlTx> {
    downcast_tx::<MySqlTx>(tx)
}

fn dup_key_error(err: &sqlx::Error) -> Option<&MySqlDatabaseError> {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            if mysql_err.number() == 1062 {
                // ER_DUP_ENTRY
                return Some(mysql_err);
            }
        }
    }

    None
}

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    dup_key_error(err).is_some()
}

/// ER_DUP_ENTRY naming the given unique key, e.g. `uq_user_invitation_code`.
pub fn is_dup_key_on(err: &sqlx::Error, key: &str) -> bool {
    dup_key_error(err).is_some_and(|e| e.message().contains(key))
}
