//! User schema and resolvers

use async_graphql::{
    Context, ErrorExtensions, Object, Result as GraphQLResult, ResultExt, SimpleObject, ID,
};
use tracing::info;

use super::{non_blank, parse_id, store};
use crate::error::GatewayError;
use crate::middleware::{check_user_authorization, current_user_id, require_auth};
use crate::models::{Role, User, UserPatch};

/// Public view of a user; the password hash never leaves the store
#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "User")]
pub struct UserProfile {
    pub id: ID,
    #[graphql(name = "first_name")]
    pub first_name: String,
    #[graphql(name = "last_name")]
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub notes: Option<String>,
    pub profile_image: String,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: ID(user.id.to_string()),
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            email: user.email,
            bio: user.bio,
            notes: user.notes,
            profile_image: user.profile_image,
            role: user.role,
        }
    }
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    async fn get_users(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<UserProfile>> {
        let users = store(ctx).extend()?.list_users().await.extend()?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    #[graphql(name = "getUserByID")]
    async fn get_user_by_id(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> GraphQLResult<Option<UserProfile>> {
        let id = parse_id(&id).extend()?;
        let user = store(ctx).extend()?.find_user(id).await.extend()?;
        Ok(user.map(UserProfile::from))
    }

    /// The caller's own profile, `null` when anonymous
    async fn me(&self, ctx: &Context<'_>) -> GraphQLResult<Option<UserProfile>> {
        let Some(user_id) = current_user_id(ctx) else {
            return Ok(None);
        };
        let user = store(ctx).extend()?.find_user(user_id).await.extend()?;
        Ok(user.map(UserProfile::from))
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    /// Only non-empty arguments are applied; a new password is re-hashed
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        username: Option<String>,
        password: Option<String>,
        bio: Option<String>,
        notes: Option<String>,
        profile_image: Option<String>,
    ) -> GraphQLResult<UserProfile> {
        let caller = require_auth(ctx).extend()?;
        let id = parse_id(&id).extend()?;
        let store = store(ctx).extend()?;

        if store.find_user(id).await.extend()?.is_none() {
            return Err(GatewayError::not_found("User").extend());
        }
        check_user_authorization(caller, id).extend()?;

        let password_hash = match non_blank(password) {
            Some(password) => Some(
                crypto_core::password::hash_password(&password)
                    .map_err(GatewayError::from)
                    .extend()?,
            ),
            None => None,
        };

        let patch = UserPatch {
            username: non_blank(username),
            password_hash,
            bio: non_blank(bio),
            notes: non_blank(notes),
            profile_image: non_blank(profile_image),
        };
        let changed = !patch.is_empty();

        let user = store
            .update_user(id, patch)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("User"))
            .extend()?;

        if changed {
            info!(user_id = %id, "User profile updated");
        }
        Ok(user.into())
    }
}
