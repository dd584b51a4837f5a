//! Registration and login resolvers

use async_graphql::{
    Context, ErrorExtensions, Object, Result as GraphQLResult, ResultExt, SimpleObject,
};
use chrono::Utc;
use crypto_core::jwt::JwtManager;
use crypto_core::password::{hash_password, verify_password};
use std::sync::Arc;
use tracing::{info, warn};

use super::user::UserProfile;
use super::{email_service, store};
use crate::error::GatewayError;
use crate::models::{NewUser, Role};

#[derive(SimpleObject, Clone, Debug)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Default)]
pub struct AuthQuery;

#[Object]
impl AuthQuery {
    async fn health(&self) -> &str {
        "ok"
    }
}

#[derive(Default)]
pub struct AuthMutation;

#[Object]
impl AuthMutation {
    /// Register a new account and send the welcome email
    #[allow(clippy::too_many_arguments)]
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "first_name")] first_name: String,
        #[graphql(name = "last_name")] last_name: String,
        username: String,
        email: String,
        password: String,
        role: String,
    ) -> GraphQLResult<UserProfile> {
        let all_present = [&first_name, &last_name, &username, &email, &password, &role]
            .iter()
            .all(|f| !f.trim().is_empty());
        if !all_present {
            return Err(GatewayError::Validation("All fields are required".to_string()).extend());
        }

        let store = store(ctx).extend()?;
        if store.find_user_by_email(&email).await.extend()?.is_some() {
            return Err(GatewayError::Conflict(
                crate::db::DUPLICATE_EMAIL.to_string(),
            )
            .extend());
        }

        let password_hash = hash_password(&password)
            .map_err(GatewayError::from)
            .extend()?;

        let user = store
            .create_user(NewUser {
                first_name,
                last_name,
                username,
                email,
                password_hash,
                role: Role::from_requested(&role),
            })
            .await
            .extend()?;

        info!(user_id = %user.id, role = %user.role, "User registered");

        // Registration stands even when the welcome email cannot be delivered
        if let Err(e) = email_service(ctx)
            .extend()?
            .send_welcome_email(&user.email, &user.username)
            .await
        {
            warn!(user_id = %user.id, error = %e, "Failed to send welcome email");
        }

        Ok(user.into())
    }

    /// Exchange credentials for a bearer token
    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> GraphQLResult<AuthPayload> {
        let store = store(ctx).extend()?;

        let mut user = store
            .find_user_by_email(&email)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::InvalidCredentials("User not found".to_string()))
            .extend()?;

        let valid = verify_password(&password, &user.password_hash)
            .map_err(GatewayError::from)
            .extend()?;
        if !valid {
            warn!(user_id = %user.id, "Login failed: invalid password");
            return Err(GatewayError::InvalidCredentials("Invalid password".to_string()).extend());
        }

        let now = Utc::now();
        store.record_login(user.id, now).await.extend()?;
        user.last_login = Some(now);

        let jwt = ctx
            .data::<Arc<JwtManager>>()
            .map_err(|_| GatewayError::Internal("JWT manager not available".to_string()))
            .extend()?;
        let token = jwt
            .issue_token(user.id, &user.email, &user.username)
            .map_err(GatewayError::from)
            .extend()?;

        info!(user_id = %user.id, "User logged in");

        Ok(AuthPayload {
            token,
            user: user.into(),
        })
    }
}
