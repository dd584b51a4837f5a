//! GraphQL schema
//!
//! Resolvers are split by area and merged into one query and one mutation
//! root. Shared state (store, JWT manager, email service, user DataLoader)
//! is attached to the schema as context data.

pub mod auth;
pub mod course;
pub mod loaders;
pub mod page;
pub mod practice;
pub mod progress;
pub mod user;

use async_graphql::{dataloader::DataLoader, Context, EmptySubscription, MergedObject, Schema, ID};
use crypto_core::jwt::JwtManager;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::GraphQLConfig;
use crate::db::DynStore;
use crate::error::{GatewayError, Result};
use crate::services::EmailService;

/// Root query object
#[derive(MergedObject, Default)]
pub struct QueryRoot(
    auth::AuthQuery,
    user::UserQuery,
    course::CourseQuery,
    page::PageQuery,
    practice::PracticeQuery,
    progress::ProgressQuery,
);

/// Root mutation object
#[derive(MergedObject, Default)]
pub struct MutationRoot(
    auth::AuthMutation,
    user::UserMutation,
    course::CourseMutation,
    page::PageMutation,
    progress::ProgressMutation,
);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema with depth/complexity limits and the user DataLoader
pub fn build_schema(
    store: DynStore,
    jwt: Arc<JwtManager>,
    email: EmailService,
    config: &GraphQLConfig,
) -> AppSchema {
    let mut builder = Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .data(DataLoader::new(
        loaders::UserLoader::new(store.clone()),
        tokio::task::spawn,
    ))
    .data(store)
    .data(jwt)
    .data(email)
    .limit_depth(config.max_depth)
    .limit_complexity(config.max_complexity);

    if !config.introspection {
        builder = builder.disable_introspection();
    }

    builder.finish()
}

pub(crate) fn store<'a>(ctx: &Context<'a>) -> Result<&'a DynStore> {
    ctx.data::<DynStore>()
        .map_err(|_| GatewayError::Internal("Store not available".to_string()))
}

pub(crate) fn email_service<'a>(ctx: &Context<'a>) -> Result<&'a EmailService> {
    ctx.data::<EmailService>()
        .map_err(|_| GatewayError::Internal("Email service not available".to_string()))
}

pub(crate) fn parse_id(id: &ID) -> Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| GatewayError::Validation("Invalid id".to_string()))
}

/// Treat blank optional strings as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn require_non_blank(field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{field} is required")));
    }
    Ok(value)
}
