use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl User {
    pub fn admin(email: &str) -> Self {
        Self {
            role: ADMIN_ROLE.to_string(),
            email: Some(email.to_string()),
            full_name: None,
        }
    }
}

/// The hosted backend's auth collaborator.
pub trait Session: Send + Sync {
    fn me(&self) -> impl Future<Output = StoreResult<User>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted(User),
    /// Send the visitor back to the home page. Carries no message: a failed
    /// session lookup and a non-admin role look the same from outside.
    Redirect,
}

pub async fn gate_admin<S: Session>(session: &S) -> AccessOutcome {
    match session.me().await {
        Ok(user) if user.role == ADMIN_ROLE => AccessOutcome::Granted(user),
        Ok(user) => {
            tracing::debug!("role {:?} is not admin; redirecting", user.role);
            AccessOutcome::Redirect
        }
        Err(e) => {
            tracing::debug!("session lookup failed ({}); redirecting", e);
            AccessOutcome::Redirect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn admin_is_granted() {
        let store = MemoryStore::new().with_user(User::admin("ops@example.com"));
        assert!(matches!(gate_admin(&store).await, AccessOutcome::Granted(_)));
    }

    #[tokio::test]
    async fn other_roles_and_errors_redirect() {
        let visitor = User {
            role: "user".to_string(),
            email: None,
            full_name: None,
        };
        let store = MemoryStore::new().with_user(visitor);
        assert_eq!(gate_admin(&store).await, AccessOutcome::Redirect);

        let signed_out = MemoryStore::new();
        assert_eq!(gate_admin(&signed_out).await, AccessOutcome::Redirect);
    }
}
