use std::sync::RwLock;

use crate::model::OwnerId;

/// Account collaborator: who is signed in on this client, if anyone.
pub trait AccountService: Send + Sync {
    fn current_user_id(&self) -> Option<OwnerId>;
}

/// In-process account holder for a single client session.
#[derive(Debug, Default)]
pub struct SessionAccount {
    user: RwLock<Option<OwnerId>>,
}

impl SessionAccount {
    pub fn signed_in(user_id: impl Into<OwnerId>) -> Self {
        Self {
            user: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<OwnerId>) {
        if let Ok(mut user) = self.user.write() {
            *user = Some(user_id.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut user) = self.user.write() {
            *user = None;
        }
    }
}

impl AccountService for SessionAccount {
    fn current_user_id(&self) -> Option<OwnerId> {
        self.user.read().ok().and_then(|u| u.clone())
    }
}
