use crate::domain_model::{InvitationCode, UserId, UserRecord};
use std::collections::BTreeSet;

/// Snapshot of the authenticated caller, built once per request.
///
/// Services take `Option<&Session>`; `None` means the caller is not
/// authenticated or has no user record yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: UserId,
    /// Friend set as of session creation. Writes re-check the stored record.
    pub friends: BTreeSet<UserId>,
    pub invitation_code: Option<InvitationCode>,
}

impl From<&UserRecord> for Session {
    fn from(user: &UserRecord) -> Self {
        Session {
            uid: user.uid.clone(),
            friends: user.friends.clone(),
            invitation_code: Some(user.invitation_code.clone()),
        }
    }
}
