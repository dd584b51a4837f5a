//! Persistence layer
//!
//! Resolvers only talk to the [`Store`] trait. `PgStore` is the production
//! backend; `MemoryStore` keeps everything in process for local runs and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, MIGRATOR};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Comment, Course, CoursePatch, NewCourse, NewUser, Page, PageContent, Question, Rating, User,
    UserPatch,
};

pub const DUPLICATE_EMAIL: &str = "User already exists with this email";
pub const DUPLICATE_USERNAME: &str = "Username is already taken";

/// Shared handle placed in the GraphQL context and REST app data
pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    /// Batch lookup; missing ids are skipped
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Fails with `Conflict` when the email or username is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    /// Users whose last login is at or before `cutoff`; never-logged-in users are excluded
    async fn users_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>>;

    // Courses
    async fn list_courses(&self) -> Result<Vec<Course>>;
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>>;
    async fn create_course(&self, course: NewCourse) -> Result<Course>;
    async fn update_course(&self, id: Uuid, patch: CoursePatch) -> Result<Option<Course>>;
    /// Removes the course with its pages, ratings, comments and progress rows
    async fn delete_course(&self, id: Uuid) -> Result<bool>;

    // Pages
    async fn list_pages(&self, course_id: Uuid) -> Result<Vec<Page>>;
    async fn find_page(&self, id: Uuid) -> Result<Option<Page>>;
    /// Appends after the last page; `NotFound` when the course does not exist
    async fn append_page(&self, course_id: Uuid, content: PageContent) -> Result<Page>;
    async fn replace_page_content(&self, id: Uuid, content: PageContent) -> Result<Option<Page>>;
    /// Every question of every video page
    async fn all_questions(&self) -> Result<Vec<Question>>;

    // Ratings and comments
    /// Insert or replace the caller's rating for the course
    async fn upsert_rating(&self, rating: Rating) -> Result<()>;
    async fn list_ratings(&self, course_id: Uuid) -> Result<Vec<Rating>>;
    async fn add_comment(&self, course_id: Uuid, user_id: Uuid, text: &str) -> Result<Comment>;
    async fn list_comments(&self, course_id: Uuid) -> Result<Vec<Comment>>;

    // Progress
    /// Returns `true` when the page was newly added to the progress record
    async fn mark_page_complete(&self, user_id: Uuid, course_id: Uuid, page_id: Uuid)
        -> Result<bool>;
    /// Completed page ids in completion order
    async fn completed_pages(&self, user_id: Uuid, course_id: Uuid) -> Result<Vec<Uuid>>;
}
