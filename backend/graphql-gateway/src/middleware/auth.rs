//! Authorization helpers for GraphQL resolvers

use async_graphql::Context;
use uuid::Uuid;

use super::jwt::AuthenticatedUser;
use crate::db::DynStore;
use crate::error::{GatewayError, Result};
use crate::models::User;

/// Caller id when the request carried a valid token
pub fn current_user_id(ctx: &Context<'_>) -> Option<Uuid> {
    ctx.data_opt::<AuthenticatedUser>().map(|user| user.0)
}

/// Verify the caller is authenticated and return their id
pub fn require_auth(ctx: &Context<'_>) -> Result<Uuid> {
    current_user_id(ctx).ok_or(GatewayError::Unauthenticated)
}

/// Load the caller's user record; a token for a vanished user counts as anonymous
pub async fn require_user(ctx: &Context<'_>) -> Result<User> {
    let user_id = require_auth(ctx)?;
    let store = ctx
        .data::<DynStore>()
        .map_err(|e| GatewayError::Internal(e.message))?;
    store
        .find_user(user_id)
        .await?
        .ok_or(GatewayError::Unauthenticated)
}

/// Verify the caller holds the teacher role
///
/// `denied` is the message returned to non-teachers.
pub async fn require_teacher(ctx: &Context<'_>, denied: &str) -> Result<User> {
    let user = require_user(ctx).await?;
    if !user.is_teacher() {
        tracing::warn!(user_id = %user.id, "Teacher-only operation attempted by student");
        return Err(GatewayError::Forbidden(denied.to_string()));
    }
    Ok(user)
}

/// Verify the caller is acting on their own account
pub fn check_user_authorization(caller: Uuid, resource_owner: Uuid) -> Result<()> {
    if caller != resource_owner {
        return Err(GatewayError::Forbidden("Unauthorized".to_string()));
    }
    Ok(())
}
