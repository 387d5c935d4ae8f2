use std::fmt::Debug;

use crate::domain::utils::id::UserName;
use crate::error::{Error, Result};

/// Tells the scheduler who is calling.
pub trait UserIdentity: Debug + Send + Sync {
    fn current_user(&self) -> Result<UserName>;
}

/// Reads the caller from `USER`, falling back to `LOGNAME`.
#[derive(Debug, Clone, Default)]
pub struct EnvUserIdentity;

impl UserIdentity for EnvUserIdentity {
    fn current_user(&self) -> Result<UserName> {
        for variable in ["USER", "LOGNAME"] {
            if let Ok(user) = std::env::var(variable) {
                if !user.trim().is_empty() {
                    return Ok(UserName::new(user.trim()));
                }
            }
        }

        Err(Error::InvalidRequest("cannot determine current user".to_string()))
    }
}

/// Always reports the same user.
#[derive(Debug, Clone)]
pub struct FixedUserIdentity {
    user: UserName,
}

impl FixedUserIdentity {
    pub fn new(user: impl Into<String>) -> Self {
        FixedUserIdentity { user: UserName::new(user) }
    }
}

impl UserIdentity for FixedUserIdentity {
    fn current_user(&self) -> Result<UserName> {
        Ok(self.user.clone())
    }
}
