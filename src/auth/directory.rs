//! Config-backed account directory.

use std::collections::HashMap;

use crate::auth::password::verify_password;
use crate::auth::{AuthError, Authenticator, Identity, UserId};
use crate::config::UserConfig;

struct Account {
    identity: Identity,
    password_hash: String,
}

/// Authenticates against the `[[users]]` table of the configuration.
pub struct DirectoryAuthenticator {
    by_username: HashMap<String, UserId>,
    accounts: HashMap<UserId, Account>,
}

impl DirectoryAuthenticator {
    pub fn new(users: &[UserConfig]) -> Self {
        let mut by_username = HashMap::with_capacity(users.len());
        let mut accounts = HashMap::with_capacity(users.len());

        for user in users {
            by_username.insert(user.username.clone(), user.id);
            accounts.insert(
                user.id,
                Account {
                    identity: Identity {
                        id: user.id,
                        username: user.username.clone(),
                        email: user.email.clone(),
                        is_active: user.is_active,
                        is_staff: user.is_staff,
                        is_superuser: user.is_superuser,
                    },
                    password_hash: user.password_hash.clone(),
                },
            );
        }

        Self {
            by_username,
            accounts,
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Authenticator for DirectoryAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let account = self
            .by_username
            .get(username)
            .and_then(|id| self.accounts.get(id))
            .ok_or(AuthError::InvalidCredentials)?;

        if verify_password(password, &account.password_hash)? {
            Ok(account.identity.clone())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    fn find(&self, id: UserId) -> Option<Identity> {
        self.accounts.get(&id).map(|account| account.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;

    fn directory() -> DirectoryAuthenticator {
        DirectoryAuthenticator::new(&[UserConfig {
            id: 7,
            username: "editor".to_string(),
            email: "editor@example.com".to_string(),
            password_hash: hash_password("s3cret").unwrap(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            two_factor_secret: None,
        }])
    }

    #[test]
    fn test_authenticate() {
        let dir = directory();
        let identity = dir.authenticate("editor", "s3cret").unwrap();
        assert_eq!(identity.id, 7);
        assert!(identity.is_admin());

        assert!(matches!(
            dir.authenticate("editor", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            dir.authenticate("nobody", "s3cret"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_find() {
        let dir = directory();
        assert_eq!(dir.find(7).unwrap().username, "editor");
        assert!(dir.find(8).is_none());
        assert_eq!(dir.len(), 1);
    }
}
