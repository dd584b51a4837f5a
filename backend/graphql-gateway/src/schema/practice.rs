//! Practice quiz: one random question drawn from every video page

use async_graphql::{Context, Object, Result as GraphQLResult, ResultExt};
use rand::seq::SliceRandom;

use super::store;
use crate::error::GatewayError;
use crate::models::Question;

#[derive(Default)]
pub struct PracticeQuery;

#[Object]
impl PracticeQuery {
    async fn get_random_question(&self, ctx: &Context<'_>) -> GraphQLResult<Question> {
        let questions = store(ctx).extend()?.all_questions().await.extend()?;
        questions
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| GatewayError::NotFound("No questions available".to_string()))
            .extend()
    }
}
