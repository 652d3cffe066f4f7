use crate::application_impl::InvitationCodeGenerator;
use crate::application_port::{UserError, UserService};
use crate::domain_model::*;
use crate::domain_port::{TxManager, UserInsert, UserRepo};
use crate::logger::*;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
    tx_manager: Arc<dyn TxManager>,
    codes: InvitationCodeGenerator,
    max_code_attempts: u32,
}

impl RealUserService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        tx_manager: Arc<dyn TxManager>,
        codes: InvitationCodeGenerator,
        max_code_attempts: u32,
    ) -> RealUserService {
        RealUserService {
            user_repo,
            tx_manager,
            codes,
            max_code_attempts: max_code_attempts.max(1),
        }
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn register(&self, uid: UserId, display_name: &str) -> Result<UserRecord, UserError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(UserError::InvalidInput("display name is empty".to_owned()));
        }
        if uid.0.trim().is_empty() {
            return Err(UserError::InvalidInput("uid is empty".to_owned()));
        }

        for attempt in 1..=self.max_code_attempts {
            let user = UserRecord {
                uid: uid.clone(),
                display_name: display_name.to_owned(),
                friends: BTreeSet::new(),
                invitation_code: self.codes.generate(),
                score: 0,
            };

            let mut tx = self
                .tx_manager
                .begin()
                .await
                .map_err(|e| UserError::Store(e.to_string()))?;

            match self
                .user_repo
                .insert_in_tx(&mut *tx, &user)
                .await
                .map_err(|e| UserError::Store(e.to_string()))?
            {
                UserInsert::Inserted => {
                    tx.commit()
                        .await
                        .map_err(|e| UserError::Store(e.to_string()))?;
                    info!(uid = %user.uid, "user registered");
                    return Ok(user);
                }
                UserInsert::UidTaken => return Err(UserError::UserExists),
                UserInsert::CodeTaken => {
                    debug!(attempt, "invitation code collision, drawing another");
                }
            }
        }

        Err(UserError::InvitationCodeExhausted(self.max_code_attempts))
    }

    async fn load_session(&self, uid: &UserId) -> Result<Option<Session>, UserError> {
        let user = self
            .user_repo
            .find_by_uid(uid)
            .await
            .map_err(|e| UserError::Store(e.to_string()))?;

        Ok(user.as_ref().map(Session::from))
    }
}
