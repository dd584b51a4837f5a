//! DataLoader implementations for N+1 query prevention
//!
//! Comment authors are resolved through [`UserLoader`], so a course with many
//! comments costs one batched user lookup per request.

use async_graphql::dataloader::Loader;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DynStore;
use crate::error::GatewayError;
use crate::models::User;

pub struct UserLoader {
    store: DynStore,
}

impl UserLoader {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Loader<Uuid> for UserLoader {
    type Value = User;
    type Error = Arc<GatewayError>;

    async fn load(&self, keys: &[Uuid]) -> Result<HashMap<Uuid, Self::Value>, Self::Error> {
        let users = self.store.find_users(keys).await.map_err(Arc::new)?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}
