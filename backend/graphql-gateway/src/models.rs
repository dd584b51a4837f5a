//! Domain records shared by the store backends and the GraphQL layer

use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::GatewayError;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub const VIDEO_PAGE_TITLE: &str = "Video Page";
pub const TEXT_PAGE_TITLE: &str = "Step-by-Step";

// ============================================================================
// Users
// ============================================================================

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[graphql(rename_items = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
}

impl Role {
    /// Registration accepts any string; only an exact `"teacher"` grants the teacher role
    pub fn from_requested(role: &str) -> Self {
        if role == "teacher" {
            Role::Teacher
        } else {
            Role::Student
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(GatewayError::Internal(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub notes: Option<String>,
    pub profile_image: String,
    pub role: Role,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Fields left as `None` are not touched
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub notes: Option<String>,
    pub profile_image: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password_hash.is_none()
            && self.bio.is_none()
            && self.notes.is_none()
            && self.profile_image.is_none()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(bio) = self.bio {
            user.bio = Some(bio);
        }
        if let Some(notes) = self.notes {
            user.notes = Some(notes);
        }
        if let Some(image) = self.profile_image {
            user.profile_image = image;
        }
    }
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl CoursePatch {
    pub fn apply(self, course: &mut Course) {
        if let Some(title) = self.title {
            course.title = title;
        }
        if let Some(description) = self.description {
            course.description = description;
        }
        if let Some(image) = self.image {
            course.image = Some(image);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Arithmetic mean of the rating values, `0.0` when unrated
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(r.value)).sum();
    sum as f64 / ratings.len() as f64
}

pub fn validate_rating(value: i32) -> Result<i32, GatewayError> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(value)
    } else {
        Err(GatewayError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )))
    }
}

// ============================================================================
// Pages
// ============================================================================

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[graphql(rename_items = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Video,
    Text,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Video => "video",
            PageKind::Text => "text",
        }
    }
}

impl FromStr for PageKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(PageKind::Video),
            "text" => Ok(PageKind::Text),
            other => Err(GatewayError::Internal(format!("unknown page kind '{other}'"))),
        }
    }
}

/// Multiple-choice question attached to a video page
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer_index: i32,
}

impl Question {
    pub fn is_correct(&self, answer_index: i32) -> bool {
        self.correct_answer_index == answer_index
    }
}

#[derive(InputObject, Debug, Clone)]
pub struct QuestionInput {
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer_index: i32,
}

impl TryFrom<QuestionInput> for Question {
    type Error = GatewayError;

    fn try_from(input: QuestionInput) -> Result<Self, Self::Error> {
        if input.answers.is_empty() {
            return Err(GatewayError::Validation(format!(
                "Question '{}' needs at least one answer",
                input.question
            )));
        }
        let in_range = usize::try_from(input.correct_answer_index)
            .map(|idx| idx < input.answers.len())
            .unwrap_or(false);
        if !in_range {
            return Err(GatewayError::Validation(format!(
                "correctAnswerIndex {} is out of range for question '{}'",
                input.correct_answer_index, input.question
            )));
        }

        Ok(Question {
            question: input.question,
            answers: input.answers,
            correct_answer_index: input.correct_answer_index,
        })
    }
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub image: Option<String>,
    pub explanation: String,
}

/// Everything about a page except its identity and position
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    Video {
        video_url: String,
        questions: Vec<Question>,
    },
    Text {
        steps: Vec<Step>,
    },
}

impl PageContent {
    pub fn kind(&self) -> PageKind {
        match self {
            PageContent::Video { .. } => PageKind::Video,
            PageContent::Text { .. } => PageKind::Text,
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            PageContent::Video { .. } => VIDEO_PAGE_TITLE,
            PageContent::Text { .. } => TEXT_PAGE_TITLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: Uuid,
    pub course_id: Uuid,
    pub position: i32,
    pub kind: PageKind,
    pub title: String,
    pub video_url: Option<String>,
    pub questions: Vec<Question>,
    pub steps: Vec<Step>,
}

impl Page {
    /// Build a page record for `content` appended at `position`
    pub fn new(course_id: Uuid, position: i32, content: PageContent) -> Self {
        let mut page = Page {
            id: Uuid::new_v4(),
            course_id,
            position,
            kind: content.kind(),
            title: content.default_title().to_string(),
            video_url: None,
            questions: Vec::new(),
            steps: Vec::new(),
        };
        page.set_content(content);
        page
    }

    /// Replace the body of the page; kind and title follow the content
    pub fn set_content(&mut self, content: PageContent) {
        self.kind = content.kind();
        self.title = content.default_title().to_string();
        match content {
            PageContent::Video {
                video_url,
                questions,
            } => {
                self.video_url = Some(video_url);
                self.questions = questions;
                self.steps = Vec::new();
            }
            PageContent::Text { steps } => {
                self.video_url = None;
                self.questions = Vec::new();
                self.steps = steps;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(value: i32) -> Rating {
        Rating {
            course_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            value,
        }
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[rating(4)]), 4.0);
        assert_eq!(average_rating(&[rating(5), rating(2), rating(4)]), 11.0 / 3.0);
    }

    #[test]
    fn test_validate_rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_role_from_requested() {
        assert_eq!(Role::from_requested("teacher"), Role::Teacher);
        assert_eq!(Role::from_requested("student"), Role::Student);
        assert_eq!(Role::from_requested("admin"), Role::Student);
        assert_eq!(Role::from_requested("Teacher"), Role::Student);
    }

    #[test]
    fn test_question_input_validation() {
        let ok = QuestionInput {
            question: "2 + 2?".into(),
            answers: vec!["3".into(), "4".into()],
            correct_answer_index: 1,
        };
        assert!(Question::try_from(ok).is_ok());

        let out_of_range = QuestionInput {
            question: "2 + 2?".into(),
            answers: vec!["4".into()],
            correct_answer_index: 1,
        };
        assert!(Question::try_from(out_of_range).is_err());

        let negative = QuestionInput {
            question: "2 + 2?".into(),
            answers: vec!["4".into()],
            correct_answer_index: -1,
        };
        assert!(Question::try_from(negative).is_err());

        let empty = QuestionInput {
            question: "?".into(),
            answers: vec![],
            correct_answer_index: 0,
        };
        assert!(Question::try_from(empty).is_err());
    }

    #[test]
    fn test_page_content_switch_clears_other_kind() {
        let course_id = Uuid::new_v4();
        let mut page = Page::new(
            course_id,
            0,
            PageContent::Video {
                video_url: "https://video.example/1".into(),
                questions: vec![],
            },
        );
        assert_eq!(page.kind, PageKind::Video);
        assert_eq!(page.title, VIDEO_PAGE_TITLE);

        page.set_content(PageContent::Text {
            steps: vec![Step {
                image: None,
                explanation: "Click run".into(),
            }],
        });
        assert_eq!(page.kind, PageKind::Text);
        assert_eq!(page.title, TEXT_PAGE_TITLE);
        assert!(page.video_url.is_none());
        assert_eq!(page.steps.len(), 1);
    }
}
