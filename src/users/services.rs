use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::users::dto::PublicUser;
use crate::users::password::Hasher;
use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{NewUser, UserChanges};
use crate::users::validation::{validate, Mode, ValidationErrors};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("email already exists: {0}")]
    DuplicateEmail(String),

    #[error("user not found: {0}")]
    NotFound(i64),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(StoreError),
}

pub type UserResult<T> = Result<T, UserError>;

/// Business rules around the user lifecycle.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: Hasher,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, hasher: Hasher) -> Self {
        Self { store, hasher }
    }

    pub async fn create_user(&self, payload: &Map<String, Value>) -> UserResult<PublicUser> {
        let input = validate(payload, Mode::Strict)
            .and_then(|input| input.into_complete())
            .map_err(rejected)?;

        if self.store.get_by_email(&input.email).await.map_err(UserError::Store)?.is_some() {
            warn!(email = %input.email, "email already exists");
            return Err(UserError::DuplicateEmail(input.email));
        }

        let password_hash = self
            .hasher
            .hash(&input.password)
            .map_err(|e| UserError::Hash(e.to_string()))?;
        let email = input.email.clone();
        let user = self
            .store
            .insert(NewUser {
                name: input.name,
                email: input.email,
                password_hash,
            })
            .await
            .map_err(|e| store_error(e, &email))?;

        info!(user_id = user.id, email = %user.email, "user created");
        Ok(user.into())
    }

    pub async fn list_users(&self) -> UserResult<Vec<PublicUser>> {
        let users = self.store.list_all().await.map_err(UserError::Store)?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    pub async fn get_user(&self, id: i64) -> UserResult<PublicUser> {
        let user = self
            .store
            .get_by_id(id)
            .await
            .map_err(UserError::Store)?
            .ok_or(UserError::NotFound(id))?;
        Ok(user.into())
    }

    /// Partial update; fields absent from `payload` keep their stored value.
    pub async fn update_user(&self, id: i64, payload: &Map<String, Value>) -> UserResult<PublicUser> {
        let input = validate(payload, Mode::Partial).map_err(rejected)?;

        let current = self
            .store
            .get_by_id(id)
            .await
            .map_err(UserError::Store)?
            .ok_or(UserError::NotFound(id))?;

        if input.is_empty() {
            return Ok(current.into());
        }

        let email = input.email.filter(|e| *e != current.email);
        if let Some(new_email) = &email {
            let taken = self
                .store
                .get_by_email(new_email)
                .await
                .map_err(UserError::Store)?
                .is_some_and(|other| other.id != id);
            if taken {
                warn!(user_id = id, email = %new_email, "email already exists");
                return Err(UserError::DuplicateEmail(new_email.clone()));
            }
        }

        let password_hash = match &input.password {
            Some(plain) => Some(
                self.hasher
                    .hash(plain)
                    .map_err(|e| UserError::Hash(e.to_string()))?,
            ),
            None => None,
        };

        let changes = UserChanges {
            name: input.name,
            email,
            password_hash,
        };
        let attempted_email = changes.email.clone().unwrap_or_default();
        let updated = self
            .store
            .update(id, changes)
            .await
            .map_err(|e| store_error(e, &attempted_email))?
            .ok_or(UserError::NotFound(id))?;

        info!(user_id = id, email = %updated.email, "user updated");
        Ok(updated.into())
    }

    pub async fn delete_user(&self, id: i64) -> UserResult<()> {
        let user = self
            .store
            .get_by_id(id)
            .await
            .map_err(UserError::Store)?
            .ok_or(UserError::NotFound(id))?;
        if !self.store.delete(id).await.map_err(UserError::Store)? {
            return Err(UserError::NotFound(id));
        }
        info!(user_id = id, email = %user.email, "user deleted");
        Ok(())
    }
}

fn rejected(errors: ValidationErrors) -> UserError {
    warn!(fields = ?errors.fields().collect::<Vec<_>>(), "payload rejected");
    UserError::Validation(errors)
}

/// The unique constraint is the final arbiter when two writers race past the pre-check.
fn store_error(e: StoreError, email: &str) -> UserError {
    match e {
        StoreError::EmailTaken => UserError::DuplicateEmail(email.to_string()),
        other => UserError::Store(other),
    }
}
