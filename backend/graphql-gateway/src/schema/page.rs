//! Page schema and resolvers
//!
//! A page is either a video with quiz questions or a step-by-step explanation.

use async_graphql::{
    Context, ErrorExtensions, Object, Result as GraphQLResult, ResultExt, SimpleObject, ID,
};
use tracing::info;

use super::course::{existing_course, CourseDetail};
use super::{non_blank, parse_id, require_non_blank, store};
use crate::error::GatewayError;
use crate::middleware::require_teacher;
use crate::models::{Page, PageContent, PageKind, Question, QuestionInput, Step};

/// Minimal page listing used for in-course navigation
#[derive(SimpleObject, Clone, Debug)]
pub struct PageRef {
    pub id: ID,
    pub title: String,
}

/// The owning course as seen from a page
#[derive(SimpleObject, Clone, Debug)]
pub struct CourseRef {
    pub id: ID,
    pub title: String,
    pub pages: Vec<PageRef>,
}

pub struct PageDetail(pub Page);

impl From<Page> for PageDetail {
    fn from(page: Page) -> Self {
        PageDetail(page)
    }
}

#[Object(name = "Page")]
impl PageDetail {
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    #[graphql(name = "type")]
    async fn kind(&self) -> PageKind {
        self.0.kind
    }

    async fn position(&self) -> i32 {
        self.0.position
    }

    async fn video_url(&self) -> Option<&str> {
        self.0.video_url.as_deref()
    }

    async fn questions(&self) -> &[Question] {
        &self.0.questions
    }

    async fn steps(&self) -> &[Step] {
        &self.0.steps
    }

    async fn course(&self, ctx: &Context<'_>) -> GraphQLResult<CourseRef> {
        let store = store(ctx).extend()?;
        let course = existing_course(store, self.0.course_id).await.extend()?;
        let pages = store.list_pages(course.id).await.extend()?;

        Ok(CourseRef {
            id: ID(course.id.to_string()),
            title: course.title,
            pages: pages
                .into_iter()
                .map(|p| PageRef {
                    id: ID(p.id.to_string()),
                    title: p.title,
                })
                .collect(),
        })
    }
}

fn convert_questions(questions: Vec<QuestionInput>) -> crate::error::Result<Vec<Question>> {
    questions.into_iter().map(Question::try_from).collect()
}

#[derive(Default)]
pub struct PageQuery;

#[Object]
impl PageQuery {
    async fn page(&self, ctx: &Context<'_>, id: ID) -> GraphQLResult<PageDetail> {
        let id = parse_id(&id).extend()?;
        let page = store(ctx)
            .extend()?
            .find_page(id)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Page"))
            .extend()?;
        Ok(page.into())
    }
}

#[derive(Default)]
pub struct PageMutation;

#[Object]
impl PageMutation {
    /// Append a video page with its quiz questions
    async fn add_video_page_to_course(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        video_url: String,
        questions: Vec<QuestionInput>,
    ) -> GraphQLResult<CourseDetail> {
        require_teacher(ctx, "Only teachers can add pages")
            .await
            .extend()?;
        let course_id = parse_id(&course_id).extend()?;
        let content = PageContent::Video {
            video_url: require_non_blank("videoUrl", video_url).extend()?,
            questions: convert_questions(questions).extend()?,
        };

        let store = store(ctx).extend()?;
        let page = store.append_page(course_id, content).await.extend()?;
        info!(course_id = %course_id, page_id = %page.id, "Video page added");

        Ok(existing_course(store, course_id).await.extend()?.into())
    }

    /// Append a step-by-step page with a single step
    async fn add_page_to_course(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        image: Option<String>,
        explanation: String,
    ) -> GraphQLResult<CourseDetail> {
        require_teacher(ctx, "Only teachers can add pages")
            .await
            .extend()?;
        let course_id = parse_id(&course_id).extend()?;
        let content = PageContent::Text {
            steps: vec![Step {
                image: non_blank(image),
                explanation: require_non_blank("explanation", explanation).extend()?,
            }],
        };

        let store = store(ctx).extend()?;
        let page = store.append_page(course_id, content).await.extend()?;
        info!(course_id = %course_id, page_id = %page.id, "Text page added");

        Ok(existing_course(store, course_id).await.extend()?.into())
    }

    /// Replace the questions of a video page; a non-empty `videoUrl` also replaces the URL
    async fn update_video_page(
        &self,
        ctx: &Context<'_>,
        page_id: ID,
        video_url: Option<String>,
        questions: Vec<QuestionInput>,
    ) -> GraphQLResult<PageDetail> {
        require_teacher(ctx, "Only teachers can edit pages")
            .await
            .extend()?;
        let page_id = parse_id(&page_id).extend()?;
        let store = store(ctx).extend()?;

        let page = store
            .find_page(page_id)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Page"))
            .extend()?;
        if page.kind != PageKind::Video {
            return Err(GatewayError::Validation("Page is not a video page".to_string()).extend());
        }

        let content = PageContent::Video {
            video_url: non_blank(video_url)
                .or(page.video_url)
                .unwrap_or_default(),
            questions: convert_questions(questions).extend()?,
        };
        let page = store
            .replace_page_content(page_id, content)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Page"))
            .extend()?;

        info!(page_id = %page_id, "Video page updated");
        Ok(page.into())
    }

    /// Replace the steps of a text page with a single step
    async fn update_page(
        &self,
        ctx: &Context<'_>,
        page_id: ID,
        image: Option<String>,
        explanation: String,
    ) -> GraphQLResult<PageDetail> {
        require_teacher(ctx, "Only teachers can edit pages")
            .await
            .extend()?;
        let page_id = parse_id(&page_id).extend()?;
        let explanation = require_non_blank("explanation", explanation).extend()?;
        let store = store(ctx).extend()?;

        let page = store
            .find_page(page_id)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Page"))
            .extend()?;
        if page.kind != PageKind::Text {
            return Err(GatewayError::Validation("Page is not a text page".to_string()).extend());
        }

        let content = PageContent::Text {
            steps: vec![Step {
                image: non_blank(image),
                explanation,
            }],
        };
        let page = store
            .replace_page_content(page_id, content)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Page"))
            .extend()?;

        info!(page_id = %page_id, "Text page updated");
        Ok(page.into())
    }
}
