use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, DUPLICATE_EMAIL, DUPLICATE_USERNAME};
use crate::error::{GatewayError, Result};
use crate::models::{
    Comment, Course, CoursePatch, NewCourse, NewUser, Page, PageContent, PageKind, Question,
    Rating, User, UserPatch,
};

#[derive(Default)]
struct State {
    // Vecs keep insertion order for listings
    users: Vec<User>,
    courses: Vec<Course>,
    pages: HashMap<Uuid, Page>,
    ratings: HashMap<(Uuid, Uuid), i32>,
    comments: Vec<Comment>,
    progress: HashMap<(Uuid, Uuid), Vec<Uuid>>,
}

/// In-process store backed by a single `RwLock`
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email == new.email) {
            return Err(GatewayError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        if state.users.iter().any(|u| u.username == new.username) {
            return Err(GatewayError::Conflict(DUPLICATE_USERNAME.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            bio: None,
            notes: None,
            profile_image: String::new(),
            role: new.role,
            last_login: None,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        if let Some(username) = &patch.username {
            if state
                .users
                .iter()
                .any(|u| u.id != id && &u.username == username)
            {
                return Err(GatewayError::Conflict(DUPLICATE_USERNAME.to_string()));
            }
        }

        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        patch.apply(user);
        Ok(Some(user.clone()))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn users_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| u.last_login.is_some_and(|at| at <= cutoff))
            .cloned()
            .collect())
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        Ok(self.state.read().await.courses.clone())
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>> {
        let state = self.state.read().await;
        Ok(state.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn create_course(&self, new: NewCourse) -> Result<Course> {
        let course = Course {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            image: new.image,
            created_at: Utc::now(),
        };
        self.state.write().await.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: Uuid, patch: CoursePatch) -> Result<Option<Course>> {
        let mut state = self.state.write().await;
        let Some(course) = state.courses.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        patch.apply(course);
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.courses.len();
        state.courses.retain(|c| c.id != id);
        if state.courses.len() == before {
            return Ok(false);
        }

        state.pages.retain(|_, p| p.course_id != id);
        state.ratings.retain(|(course_id, _), _| *course_id != id);
        state.comments.retain(|c| c.course_id != id);
        state.progress.retain(|(_, course_id), _| *course_id != id);
        Ok(true)
    }

    async fn list_pages(&self, course_id: Uuid) -> Result<Vec<Page>> {
        let state = self.state.read().await;
        let mut pages: Vec<Page> = state
            .pages
            .values()
            .filter(|p| p.course_id == course_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.position);
        Ok(pages)
    }

    async fn find_page(&self, id: Uuid) -> Result<Option<Page>> {
        Ok(self.state.read().await.pages.get(&id).cloned())
    }

    async fn append_page(&self, course_id: Uuid, content: PageContent) -> Result<Page> {
        let mut state = self.state.write().await;
        if !state.courses.iter().any(|c| c.id == course_id) {
            return Err(GatewayError::not_found("Course"));
        }

        let position = state
            .pages
            .values()
            .filter(|p| p.course_id == course_id)
            .map(|p| p.position + 1)
            .max()
            .unwrap_or(0);
        let page = Page::new(course_id, position, content);
        state.pages.insert(page.id, page.clone());
        Ok(page)
    }

    async fn replace_page_content(&self, id: Uuid, content: PageContent) -> Result<Option<Page>> {
        let mut state = self.state.write().await;
        let Some(page) = state.pages.get_mut(&id) else {
            return Ok(None);
        };
        page.set_content(content);
        Ok(Some(page.clone()))
    }

    async fn all_questions(&self) -> Result<Vec<Question>> {
        let state = self.state.read().await;
        Ok(state
            .pages
            .values()
            .filter(|p| p.kind == PageKind::Video)
            .flat_map(|p| p.questions.iter().cloned())
            .collect())
    }

    async fn upsert_rating(&self, rating: Rating) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .ratings
            .insert((rating.course_id, rating.user_id), rating.value);
        Ok(())
    }

    async fn list_ratings(&self, course_id: Uuid) -> Result<Vec<Rating>> {
        let state = self.state.read().await;
        Ok(state
            .ratings
            .iter()
            .filter(|((c, _), _)| *c == course_id)
            .map(|(&(course_id, user_id), &value)| Rating {
                course_id,
                user_id,
                value,
            })
            .collect())
    }

    async fn add_comment(&self, course_id: Uuid, user_id: Uuid, text: &str) -> Result<Comment> {
        let mut state = self.state.write().await;
        if !state.courses.iter().any(|c| c.id == course_id) {
            return Err(GatewayError::not_found("Course"));
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, course_id: Uuid) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn mark_page_complete(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        page_id: Uuid,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let completed = state.progress.entry((user_id, course_id)).or_default();
        if completed.contains(&page_id) {
            return Ok(false);
        }
        completed.push(page_id);
        Ok(true)
    }

    async fn completed_pages(&self, user_id: Uuid, course_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .progress
            .get(&(user_id, course_id))
            .cloned()
            .unwrap_or_default())
    }
}
