use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::flow::User;
use crate::{Error, Result};

/// In-memory user registry: the id→user map plus the global set of claimed
/// emails. The registry is owned explicitly and handed to the engine rather
/// than living in module-level state. Every mutating operation runs to
/// completion under the write lock, which serializes mutation of any given
/// user and keeps the email set consistent with the map; no lock is held
/// across an await point.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    emails: HashSet<String>,
}

fn user_not_found() -> Error {
    Error::NotFound("User not found".to_string())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, claiming its email. Fails when the email is already
    /// claimed by any user.
    pub async fn register(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains(&user.email) {
            return Err(Error::Conflict("Email already exists.".to_string()));
        }
        inner.emails.insert(user.email.clone());
        inner.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Remove a user, releasing its email.
    pub async fn delete(&self, user_id: &str) -> Result<User> {
        let mut inner = self.inner.write().await;
        let user = inner.users.remove(user_id).ok_or_else(user_not_found)?;
        inner.emails.remove(&user.email);
        Ok(user)
    }

    /// Swap a user's email for a new, unclaimed one.
    pub async fn update_email(&self, user_id: &str, new_email: String) -> Result<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if !inner.users.contains_key(user_id) {
            return Err(user_not_found());
        }
        if inner.emails.contains(&new_email) {
            return Err(Error::Conflict("Email already exists.".to_string()));
        }
        let user = inner.users.get_mut(user_id).ok_or_else(user_not_found)?;
        let old_email = std::mem::replace(&mut user.email, new_email.clone());
        inner.emails.remove(&old_email);
        inner.emails.insert(new_email);
        Ok(())
    }

    pub async fn list(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .await
            .users
            .iter()
            .map(|(id, user)| (id.clone(), user.email.clone()))
            .collect()
    }

    /// Run a read-only closure against a user.
    pub async fn read_user<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&User) -> Result<T>,
    ) -> Result<T> {
        let inner = self.inner.read().await;
        let user = inner.users.get(user_id).ok_or_else(user_not_found)?;
        f(user)
    }

    /// Run a mutating closure against a user. The closure runs to completion
    /// under the write lock, so no other operation observes the user mid-
    /// mutation.
    pub async fn with_user<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut User) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(user_id).ok_or_else(user_not_found)?;
        f(user)
    }
}
