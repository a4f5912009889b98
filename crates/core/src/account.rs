//! Account entity model.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Credential material for one external provider account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Saved session cookies, if a prior login left any.
    pub cookies: Option<String>,
}

/// A credentialed external identity with a daily usage quota per task
/// type. Usage is not stored here: it is derived by counting tasks that
/// reference the account (see the allocator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: DbId,
    pub name: String,
    pub credential: Credential,
}
