//! Course progress and quiz answers

use async_graphql::{
    Context, ErrorExtensions, Object, Result as GraphQLResult, ResultExt, SimpleObject, ID,
};
use tracing::{debug, info};

use super::{parse_id, store};
use crate::error::GatewayError;
use crate::middleware::require_auth;
use crate::models::PageKind;

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct QuizAnswerResult {
    pub correct: bool,
    pub correct_answer_index: i32,
    /// Whether the page is in the caller's progress record after this answer
    pub page_completed: bool,
}

#[derive(Default)]
pub struct ProgressQuery;

#[Object]
impl ProgressQuery {
    /// Completed page ids for the caller, in completion order
    async fn get_user_progress(&self, ctx: &Context<'_>, course_id: ID) -> GraphQLResult<Vec<ID>> {
        let user_id = require_auth(ctx).extend()?;
        let course_id = parse_id(&course_id).extend()?;

        let pages = store(ctx)
            .extend()?
            .completed_pages(user_id, course_id)
            .await
            .extend()?;
        Ok(pages.into_iter().map(|id| ID(id.to_string())).collect())
    }
}

#[derive(Default)]
pub struct ProgressMutation;

#[Object]
impl ProgressMutation {
    async fn mark_page_complete(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        page_id: ID,
    ) -> GraphQLResult<bool> {
        let user_id = require_auth(ctx).extend()?;
        let course_id = parse_id(&course_id).extend()?;
        let page_id = parse_id(&page_id).extend()?;
        let store = store(ctx).extend()?;

        let belongs = store
            .find_page(page_id)
            .await
            .extend()?
            .is_some_and(|p| p.course_id == course_id);
        if !belongs {
            return Err(GatewayError::NotFound("Page not found in course".to_string()).extend());
        }

        let added = store
            .mark_page_complete(user_id, course_id, page_id)
            .await
            .extend()?;
        debug!(
            user_id = %user_id,
            course_id = %course_id,
            page_id = %page_id,
            added,
            "Page marked complete"
        );
        Ok(true)
    }

    /// Check an answer; a correct one completes the page for its course
    async fn submit_quiz_answer(
        &self,
        ctx: &Context<'_>,
        page_id: ID,
        question_index: i32,
        answer_index: i32,
    ) -> GraphQLResult<QuizAnswerResult> {
        let user_id = require_auth(ctx).extend()?;
        let page_id = parse_id(&page_id).extend()?;
        let store = store(ctx).extend()?;

        let page = store
            .find_page(page_id)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Page"))
            .extend()?;
        if page.kind != PageKind::Video {
            return Err(GatewayError::Validation("Page has no quiz".to_string()).extend());
        }

        let question = usize::try_from(question_index)
            .ok()
            .and_then(|idx| page.questions.get(idx))
            .ok_or_else(|| {
                GatewayError::Validation(format!("Question {question_index} does not exist"))
            })
            .extend()?;
        let correct = question.is_correct(answer_index);

        let page_completed = if correct {
            let added = store
                .mark_page_complete(user_id, page.course_id, page.id)
                .await
                .extend()?;
            if added {
                info!(
                    user_id = %user_id,
                    course_id = %page.course_id,
                    page_id = %page.id,
                    "Quiz passed, page completed"
                );
            }
            true
        } else {
            store
                .completed_pages(user_id, page.course_id)
                .await
                .extend()?
                .contains(&page.id)
        };

        Ok(QuizAnswerResult {
            correct,
            correct_answer_index: question.correct_answer_index,
            page_completed,
        })
    }
}
