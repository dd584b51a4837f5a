//! Course schema and resolvers: catalogue, authoring, ratings and comments

use async_graphql::{
    dataloader::DataLoader, Context, ErrorExtensions, Object, Result as GraphQLResult, ResultExt,
    ID,
};
use tracing::info;
use uuid::Uuid;

use super::loaders::UserLoader;
use super::page::PageDetail;
use super::user::UserProfile;
use super::{email_service, non_blank, parse_id, require_non_blank, store};
use crate::db::DynStore;
use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::middleware::{require_auth, require_teacher, require_user};
use crate::models::{average_rating, validate_rating, Comment, Course, CoursePatch, NewCourse, Rating};

pub struct CourseDetail(pub Course);

impl From<Course> for CourseDetail {
    fn from(course: Course) -> Self {
        CourseDetail(course)
    }
}

#[Object(name = "Course")]
impl CourseDetail {
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn description(&self) -> &str {
        &self.0.description
    }

    async fn image(&self) -> Option<&str> {
        self.0.image.as_deref()
    }

    /// RFC 3339 timestamp
    async fn created_at(&self) -> String {
        self.0.created_at.to_rfc3339()
    }

    /// Mean of all ratings, `0.0` when unrated
    async fn average_rating(&self, ctx: &Context<'_>) -> GraphQLResult<f64> {
        let ratings = store(ctx).extend()?.list_ratings(self.0.id).await.extend()?;
        Ok(average_rating(&ratings))
    }

    async fn pages(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<PageDetail>> {
        let pages = store(ctx).extend()?.list_pages(self.0.id).await.extend()?;
        Ok(pages.into_iter().map(PageDetail::from).collect())
    }

    async fn comments(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<CommentEntry>> {
        let comments = store(ctx).extend()?.list_comments(self.0.id).await.extend()?;
        Ok(comments.into_iter().map(CommentEntry::from).collect())
    }
}

pub struct CommentEntry(pub Comment);

impl From<Comment> for CommentEntry {
    fn from(comment: Comment) -> Self {
        CommentEntry(comment)
    }
}

#[Object(name = "Comment")]
impl CommentEntry {
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    /// Author, batch-loaded; `null` if the account no longer exists
    async fn user(&self, ctx: &Context<'_>) -> GraphQLResult<Option<UserProfile>> {
        let loader = ctx.data::<DataLoader<UserLoader>>()?;
        let user = loader
            .load_one(self.0.user_id)
            .await
            .map_err(|e| e.as_ref().extend())?;
        Ok(user.map(UserProfile::from))
    }

    async fn text(&self) -> &str {
        &self.0.text
    }

    /// RFC 3339 timestamp
    async fn created_at(&self) -> String {
        self.0.created_at.to_rfc3339()
    }
}

/// Load a course or fail with `NOT_FOUND`
pub(crate) async fn existing_course(store: &DynStore, id: Uuid) -> Result<Course> {
    store
        .find_course(id)
        .await?
        .ok_or_else(|| GatewayError::not_found("Course"))
}

#[derive(Default)]
pub struct CourseQuery;

#[Object]
impl CourseQuery {
    /// All courses, oldest first
    async fn get_courses(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<CourseDetail>> {
        let courses = store(ctx).extend()?.list_courses().await.extend()?;
        Ok(courses.into_iter().map(CourseDetail::from).collect())
    }

    async fn course(&self, ctx: &Context<'_>, id: ID) -> GraphQLResult<Option<CourseDetail>> {
        let id = parse_id(&id).extend()?;
        let course = store(ctx).extend()?.find_course(id).await.extend()?;
        Ok(course.map(CourseDetail::from))
    }
}

#[derive(Default)]
pub struct CourseMutation;

#[Object]
impl CourseMutation {
    async fn create_course(
        &self,
        ctx: &Context<'_>,
        title: String,
        description: String,
        image: Option<String>,
    ) -> GraphQLResult<CourseDetail> {
        let teacher = require_teacher(ctx, "Only teachers can create courses")
            .await
            .extend()?;
        let course = NewCourse {
            title: require_non_blank("title", title).extend()?,
            description: require_non_blank("description", description).extend()?,
            image: non_blank(image),
        };

        let course = store(ctx).extend()?.create_course(course).await.extend()?;
        info!(course_id = %course.id, user_id = %teacher.id, "Course created");
        Ok(course.into())
    }

    async fn update_course(
        &self,
        ctx: &Context<'_>,
        id: ID,
        title: Option<String>,
        description: Option<String>,
        image: Option<String>,
    ) -> GraphQLResult<CourseDetail> {
        require_teacher(ctx, "Only teachers can update courses")
            .await
            .extend()?;
        let id = parse_id(&id).extend()?;

        let patch = CoursePatch {
            title: non_blank(title),
            description: non_blank(description),
            image,
        };
        let course = store(ctx)
            .extend()?
            .update_course(id, patch)
            .await
            .extend()?
            .ok_or_else(|| GatewayError::not_found("Course"))
            .extend()?;

        info!(course_id = %course.id, "Course updated");
        Ok(course.into())
    }

    async fn delete_course(&self, ctx: &Context<'_>, id: ID) -> GraphQLResult<bool> {
        let teacher = require_teacher(ctx, "Only teachers can delete courses")
            .await
            .extend()?;
        let id = parse_id(&id).extend()?;

        let deleted = store(ctx).extend()?.delete_course(id).await.extend()?;
        if !deleted {
            return Err(GatewayError::not_found("Course").extend());
        }

        info!(course_id = %id, user_id = %teacher.id, "Course deleted");
        Ok(true)
    }

    /// Insert or replace the caller's 1-5 rating
    async fn rate_course(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        value: i32,
    ) -> GraphQLResult<CourseDetail> {
        let user_id = require_auth(ctx).extend()?;
        let course_id = parse_id(&course_id).extend()?;
        let value = validate_rating(value).extend()?;
        let store = store(ctx).extend()?;

        let course = existing_course(store, course_id).await.extend()?;
        store
            .upsert_rating(Rating {
                course_id,
                user_id,
                value,
            })
            .await
            .extend()?;

        info!(course_id = %course_id, user_id = %user_id, value, "Course rated");
        Ok(course.into())
    }

    async fn add_comment(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        text: String,
    ) -> GraphQLResult<CourseDetail> {
        let user_id = require_auth(ctx).extend()?;
        let course_id = parse_id(&course_id).extend()?;
        let text = require_non_blank("text", text).extend()?;
        let store = store(ctx).extend()?;

        let course = existing_course(store, course_id).await.extend()?;
        store
            .add_comment(course_id, user_id, &text)
            .await
            .extend()?;

        info!(course_id = %course_id, user_id = %user_id, "Comment added");
        Ok(course.into())
    }

    /// Email the caller a reminder to finish the course
    async fn send_course_reminder(&self, ctx: &Context<'_>, course_id: ID) -> GraphQLResult<bool> {
        let user = require_user(ctx).await.extend()?;
        let course_id = parse_id(&course_id).extend()?;
        let course = existing_course(store(ctx).extend()?, course_id)
            .await
            .extend()?;

        let sent = email_service(ctx)
            .extend()?
            .send_course_reminder(&user.email, &user.username, &course.title)
            .await;
        metrics::record_reminder_email("course", sent.is_ok());
        sent.extend()?;

        info!(course_id = %course_id, user_id = %user.id, "Course reminder sent");
        Ok(true)
    }
}
