//! Owning account resolution (uid -> user name).

use nix::unistd::{Uid, User};
use thiserror::Error;

/// Failure to turn a uid into an account name.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("no account for uid {0}")]
    Unknown(u32),

    #[error("account lookup for uid {uid} failed: {source}")]
    Lookup {
        uid: u32,
        #[source]
        source: nix::Error,
    },
}

/// Resolves numeric owner ids to display names.
pub trait AccountResolver: Send + Sync {
    fn account_name(&self, uid: u32) -> Result<String, AccountError>;
}

/// Resolver backed by the system user database (getpwuid_r).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccounts;

impl AccountResolver for SystemAccounts {
    fn account_name(&self, uid: u32) -> Result<String, AccountError> {
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Err(AccountError::Unknown(uid)),
            Err(source) => Err(AccountError::Lookup { uid, source }),
        }
    }
}
