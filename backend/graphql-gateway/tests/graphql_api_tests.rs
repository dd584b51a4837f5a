//! End-to-end GraphQL tests against the in-memory store
//!
//! Each test builds a fresh schema, so accounts and courses never leak
//! between tests.

use actix_web::{test, web, App};
use async_graphql::{Request, Response, Variables};
use crypto_core::jwt::JwtManager;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use learningpulse_gateway::config::GraphQLConfig;
use learningpulse_gateway::db::{DynStore, MemoryStore};
use learningpulse_gateway::handlers;
use learningpulse_gateway::middleware::{AuthenticatedUser, JwtMiddleware};
use learningpulse_gateway::schema::{build_schema, AppSchema};
use learningpulse_gateway::services::{EmailService, RecordingMailer};

const SECRET: &str = "integration-test-secret-0123456789";

struct TestApp {
    schema: AppSchema,
    jwt: Arc<JwtManager>,
    mailer: Arc<RecordingMailer>,
}

impl TestApp {
    fn new() -> Self {
        let store: DynStore = Arc::new(MemoryStore::new());
        let jwt = Arc::new(JwtManager::new(SECRET, "learningpulse", 3600).unwrap());
        let mailer = Arc::new(RecordingMailer::new());
        let email = EmailService::new(mailer.clone(), "http://localhost:3000");
        let schema = build_schema(store, jwt.clone(), email, &GraphQLConfig::default());
        Self {
            schema,
            jwt,
            mailer,
        }
    }

    async fn execute(&self, query: &str, vars: Value, caller: Option<Uuid>) -> Response {
        let mut request = Request::new(query).variables(Variables::from_json(vars));
        if let Some(id) = caller {
            request = request.data(AuthenticatedUser(id));
        }
        self.schema.execute(request).await
    }

    /// Run a request that must succeed and return its data as JSON
    async fn ok(&self, query: &str, vars: Value, caller: Option<Uuid>) -> Value {
        let resp = self.execute(query, vars, caller).await;
        assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);
        resp.data.into_json().unwrap()
    }

    /// Run a request that must fail and return the first error code
    async fn error_code(&self, query: &str, vars: Value, caller: Option<Uuid>) -> String {
        let resp = self.execute(query, vars, caller).await;
        assert!(!resp.errors.is_empty(), "expected an error");
        let err = serde_json::to_value(&resp.errors[0]).unwrap();
        err["extensions"]["code"].as_str().unwrap_or_default().to_string()
    }

    async fn register(&self, username: &str, role: &str) -> Uuid {
        let data = self
            .ok(
                r#"mutation($username: String!, $email: String!, $role: String!) {
                    createUser(first_name: "Test", last_name: "User", username: $username,
                               email: $email, password: "hunter22", role: $role) { id role }
                }"#,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "role": role,
                }),
                None,
            )
            .await;
        Uuid::parse_str(data["createUser"]["id"].as_str().unwrap()).unwrap()
    }

    async fn create_course(&self, teacher: Uuid, title: &str) -> String {
        let data = self
            .ok(
                r#"mutation($title: String!) {
                    createCourse(title: $title, description: "Basics") { id }
                }"#,
                json!({ "title": title }),
                Some(teacher),
            )
            .await;
        data["createCourse"]["id"].as_str().unwrap().to_string()
    }

    async fn add_quiz_page(&self, teacher: Uuid, course_id: &str) -> String {
        let data = self
            .ok(
                r#"mutation($courseId: ID!) {
                    addVideoPageToCourse(courseId: $courseId, videoUrl: "https://videos.example.com/1",
                        questions: [{ question: "2 + 2?", answers: ["3", "4"], correctAnswerIndex: 1 }]) {
                        pages { id type title }
                    }
                }"#,
                json!({ "courseId": course_id }),
                Some(teacher),
            )
            .await;
        let page = &data["addVideoPageToCourse"]["pages"][0];
        assert_eq!(page["type"], "video");
        assert_eq!(page["title"], "Video Page");
        page["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_register_then_login_issues_valid_token() {
    let app = TestApp::new();
    let user_id = app.register("alice", "student").await;

    let data = app
        .ok(
            r#"mutation {
                login(email: "alice@example.com", password: "hunter22") {
                    token
                    user { id username role }
                }
            }"#,
            json!({}),
            None,
        )
        .await;

    let token = data["login"]["token"].as_str().unwrap();
    assert_eq!(app.jwt.user_id_from_token(token).unwrap(), user_id);
    assert_eq!(data["login"]["user"]["username"], "alice");
    assert_eq!(data["login"]["user"]["role"], "student");

    let welcome = app.mailer.sent();
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0].recipient, "alice@example.com");
    assert_eq!(welcome[0].subject, "Welcome to Our Platform!");
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthenticated() {
    let app = TestApp::new();
    app.register("bob", "student").await;

    let code = app
        .error_code(
            r#"mutation { login(email: "bob@example.com", password: "nope") { token } }"#,
            json!({}),
            None,
        )
        .await;
    assert_eq!(code, "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let app = TestApp::new();
    app.register("carol", "student").await;

    let code = app
        .error_code(
            r#"mutation {
                createUser(first_name: "C", last_name: "D", username: "carol2",
                           email: "carol@example.com", password: "pw", role: "student") { id }
            }"#,
            json!({}),
            None,
        )
        .await;
    assert_eq!(code, "CONFLICT");
}

#[tokio::test]
async fn test_unknown_role_falls_back_to_student() {
    let app = TestApp::new();
    let id = app.register("dave", "admin").await;

    let data = app
        .ok("{ me { id role } }", json!({}), Some(id))
        .await;
    assert_eq!(data["me"]["role"], "student");
}

#[tokio::test]
async fn test_only_teachers_delete_courses() {
    let app = TestApp::new();
    let teacher = app.register("tina", "teacher").await;
    let student = app.register("sam", "student").await;
    let course_id = app.create_course(teacher, "Rust").await;

    let delete = r#"mutation($id: ID!) { deleteCourse(id: $id) }"#;
    let code = app
        .error_code(delete, json!({ "id": course_id }), Some(student))
        .await;
    assert_eq!(code, "FORBIDDEN");

    let data = app
        .ok(
            r#"query($id: ID!) { course(id: $id) { id title } }"#,
            json!({ "id": course_id }),
            None,
        )
        .await;
    assert_eq!(data["course"]["title"], "Rust");

    let data = app
        .ok(delete, json!({ "id": course_id }), Some(teacher))
        .await;
    assert_eq!(data["deleteCourse"], true);

    let data = app
        .ok(
            r#"query($id: ID!) { course(id: $id) { id } }"#,
            json!({ "id": course_id }),
            None,
        )
        .await;
    assert!(data["course"].is_null());
}

#[tokio::test]
async fn test_student_cannot_create_course() {
    let app = TestApp::new();
    let student = app.register("sara", "student").await;

    let code = app
        .error_code(
            r#"mutation { createCourse(title: "X", description: "Y") { id } }"#,
            json!({}),
            Some(student),
        )
        .await;
    assert_eq!(code, "FORBIDDEN");
}

#[tokio::test]
async fn test_anonymous_mutation_is_unauthenticated() {
    let app = TestApp::new();
    let code = app
        .error_code(
            r#"mutation { createCourse(title: "X", description: "Y") { id } }"#,
            json!({}),
            None,
        )
        .await;
    assert_eq!(code, "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_correct_quiz_answer_completes_page_once() {
    let app = TestApp::new();
    let teacher = app.register("tom", "teacher").await;
    let student = app.register("stu", "student").await;
    let course_id = app.create_course(teacher, "Arithmetic").await;
    let page_id = app.add_quiz_page(teacher, &course_id).await;

    let submit = r#"mutation($pageId: ID!, $answer: Int!) {
        submitQuizAnswer(pageId: $pageId, questionIndex: 0, answerIndex: $answer) {
            correct correctAnswerIndex pageCompleted
        }
    }"#;

    let data = app
        .ok(submit, json!({ "pageId": page_id, "answer": 0 }), Some(student))
        .await;
    assert_eq!(
        data["submitQuizAnswer"],
        json!({ "correct": false, "correctAnswerIndex": 1, "pageCompleted": false })
    );

    for _ in 0..2 {
        let data = app
            .ok(submit, json!({ "pageId": page_id, "answer": 1 }), Some(student))
            .await;
        assert_eq!(data["submitQuizAnswer"]["correct"], true);
        assert_eq!(data["submitQuizAnswer"]["pageCompleted"], true);
    }

    let data = app
        .ok(
            r#"query($courseId: ID!) { getUserProgress(courseId: $courseId) }"#,
            json!({ "courseId": course_id }),
            Some(student),
        )
        .await;
    assert_eq!(data["getUserProgress"], json!([page_id]));
}

#[tokio::test]
async fn test_quiz_answer_out_of_range_question() {
    let app = TestApp::new();
    let teacher = app.register("tess", "teacher").await;
    let course_id = app.create_course(teacher, "Quiz").await;
    let page_id = app.add_quiz_page(teacher, &course_id).await;

    let code = app
        .error_code(
            r#"mutation($pageId: ID!) {
                submitQuizAnswer(pageId: $pageId, questionIndex: 3, answerIndex: 0) { correct }
            }"#,
            json!({ "pageId": page_id }),
            Some(teacher),
        )
        .await;
    assert_eq!(code, "BAD_USER_INPUT");
}

#[tokio::test]
async fn test_mark_page_complete_rejects_page_from_other_course() {
    let app = TestApp::new();
    let teacher = app.register("tara", "teacher").await;
    let first = app.create_course(teacher, "First").await;
    let second = app.create_course(teacher, "Second").await;
    let page_id = app.add_quiz_page(teacher, &first).await;

    let mark = r#"mutation($courseId: ID!, $pageId: ID!) {
        markPageComplete(courseId: $courseId, pageId: $pageId)
    }"#;
    let code = app
        .error_code(mark, json!({ "courseId": second, "pageId": page_id }), Some(teacher))
        .await;
    assert_eq!(code, "NOT_FOUND");

    let data = app
        .ok(mark, json!({ "courseId": first, "pageId": page_id }), Some(teacher))
        .await;
    assert_eq!(data["markPageComplete"], true);
}

#[tokio::test]
async fn test_rating_average_and_replacement() {
    let app = TestApp::new();
    let teacher = app.register("tim", "teacher").await;
    let first = app.register("fay", "student").await;
    let second = app.register("sid", "student").await;
    let course_id = app.create_course(teacher, "Ratings").await;

    let rate = r#"mutation($courseId: ID!, $value: Int!) {
        rateCourse(courseId: $courseId, value: $value) { averageRating }
    }"#;

    app.ok(rate, json!({ "courseId": course_id, "value": 4 }), Some(first))
        .await;
    let data = app
        .ok(rate, json!({ "courseId": course_id, "value": 2 }), Some(second))
        .await;
    assert_eq!(data["rateCourse"]["averageRating"], 3.0);

    let data = app
        .ok(rate, json!({ "courseId": course_id, "value": 5 }), Some(first))
        .await;
    assert_eq!(data["rateCourse"]["averageRating"], 3.5);

    let code = app
        .error_code(rate, json!({ "courseId": course_id, "value": 6 }), Some(first))
        .await;
    assert_eq!(code, "BAD_USER_INPUT");
}

#[tokio::test]
async fn test_comments_resolve_author() {
    let app = TestApp::new();
    let teacher = app.register("tia", "teacher").await;
    let student = app.register("sue", "student").await;
    let course_id = app.create_course(teacher, "Comments").await;

    let data = app
        .ok(
            r#"mutation($courseId: ID!) {
                addComment(courseId: $courseId, text: "Great course") {
                    comments { text user { username } }
                }
            }"#,
            json!({ "courseId": course_id }),
            Some(student),
        )
        .await;
    let comments = &data["addComment"]["comments"];
    assert_eq!(comments[0]["text"], "Great course");
    assert_eq!(comments[0]["user"]["username"], "sue");
}

#[tokio::test]
async fn test_missing_page_and_empty_question_pool() {
    let app = TestApp::new();

    let code = app
        .error_code(
            r#"query($id: ID!) { page(id: $id) { id } }"#,
            json!({ "id": Uuid::new_v4().to_string() }),
            None,
        )
        .await;
    assert_eq!(code, "NOT_FOUND");

    let code = app
        .error_code("{ getRandomQuestion { question } }", json!({}), None)
        .await;
    assert_eq!(code, "NOT_FOUND");
}

#[tokio::test]
async fn test_random_question_comes_from_video_pages() {
    let app = TestApp::new();
    let teacher = app.register("ted", "teacher").await;
    let course_id = app.create_course(teacher, "Practice").await;
    app.add_quiz_page(teacher, &course_id).await;

    let data = app
        .ok(
            "{ getRandomQuestion { question answers correctAnswerIndex } }",
            json!({}),
            None,
        )
        .await;
    assert_eq!(data["getRandomQuestion"]["question"], "2 + 2?");
    assert_eq!(data["getRandomQuestion"]["correctAnswerIndex"], 1);
}

#[tokio::test]
async fn test_update_user_requires_owner() {
    let app = TestApp::new();
    let owner = app.register("olga", "student").await;
    let other = app.register("oscar", "student").await;

    let update = r#"mutation($id: ID!) { updateUser(id: $id, bio: "hello") { id bio } }"#;
    let code = app
        .error_code(update, json!({ "id": owner.to_string() }), Some(other))
        .await;
    assert_eq!(code, "FORBIDDEN");

    let data = app
        .ok(update, json!({ "id": owner.to_string() }), Some(owner))
        .await;
    assert_eq!(data["updateUser"]["bio"], "hello");
}

#[tokio::test]
async fn test_course_reminder_sends_email() {
    let app = TestApp::new();
    let teacher = app.register("trix", "teacher").await;
    let student = app.register("stan", "student").await;
    let course_id = app.create_course(teacher, "Reminders").await;

    let data = app
        .ok(
            r#"mutation($courseId: ID!) { sendCourseReminder(courseId: $courseId) }"#,
            json!({ "courseId": course_id }),
            Some(student),
        )
        .await;
    assert_eq!(data["sendCourseReminder"], true);

    let reminder = app
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.recipient == "stan@example.com" && m.subject.contains("Reminders"));
    assert!(reminder.is_some());
}

#[tokio::test]
async fn test_update_page_replaces_all_steps() {
    let app = TestApp::new();
    let teacher = app.register("tanya", "teacher").await;
    let course_id = app.create_course(teacher, "Screenshots").await;

    let data = app
        .ok(
            r#"mutation($courseId: ID!) {
                addPageToCourse(courseId: $courseId, explanation: "Open the menu") {
                    pages { id type title steps { image explanation } }
                }
            }"#,
            json!({ "courseId": course_id }),
            Some(teacher),
        )
        .await;
    let page = &data["addPageToCourse"]["pages"][0];
    assert_eq!(page["type"], "text");
    assert_eq!(page["title"], "Step-by-Step");
    assert_eq!(
        page["steps"],
        json!([{ "image": null, "explanation": "Open the menu" }])
    );
    let page_id = page["id"].as_str().unwrap().to_string();

    let data = app
        .ok(
            r#"mutation($pageId: ID!) {
                updatePage(pageId: $pageId, image: "menu.png", explanation: "Click settings") {
                    id steps { image explanation }
                }
            }"#,
            json!({ "pageId": page_id }),
            Some(teacher),
        )
        .await;
    assert_eq!(data["updatePage"]["id"], page_id);
    assert_eq!(
        data["updatePage"]["steps"],
        json!([{ "image": "menu.png", "explanation": "Click settings" }])
    );
}

#[tokio::test]
async fn test_update_video_page_keeps_url_and_replaces_questions() {
    let app = TestApp::new();
    let teacher = app.register("theo", "teacher").await;
    let course_id = app.create_course(teacher, "Video").await;
    let page_id = app.add_quiz_page(teacher, &course_id).await;

    let update = r#"mutation($pageId: ID!, $url: String) {
        updateVideoPage(pageId: $pageId, videoUrl: $url, questions: [
            { question: "3 * 3?", answers: ["6", "9"], correctAnswerIndex: 1 },
            { question: "Capital of France?", answers: ["Paris", "Rome"], correctAnswerIndex: 0 }
        ]) {
            videoUrl
            questions { question answers correctAnswerIndex }
        }
    }"#;

    let data = app
        .ok(update, json!({ "pageId": page_id, "url": "" }), Some(teacher))
        .await;
    let page = &data["updateVideoPage"];
    assert_eq!(page["videoUrl"], "https://videos.example.com/1");
    assert_eq!(
        page["questions"],
        json!([
            { "question": "3 * 3?", "answers": ["6", "9"], "correctAnswerIndex": 1 },
            { "question": "Capital of France?", "answers": ["Paris", "Rome"], "correctAnswerIndex": 0 }
        ])
    );

    let data = app
        .ok(
            update,
            json!({ "pageId": page_id, "url": "https://videos.example.com/2" }),
            Some(teacher),
        )
        .await;
    assert_eq!(
        data["updateVideoPage"]["videoUrl"],
        "https://videos.example.com/2"
    );
}

#[tokio::test]
async fn test_page_kind_mismatch_is_bad_user_input() {
    let app = TestApp::new();
    let teacher = app.register("tobias", "teacher").await;
    let course_id = app.create_course(teacher, "Mixed").await;
    let video_id = app.add_quiz_page(teacher, &course_id).await;

    let data = app
        .ok(
            r#"mutation($courseId: ID!) {
                addPageToCourse(courseId: $courseId, explanation: "Step one") { pages { id } }
            }"#,
            json!({ "courseId": course_id }),
            Some(teacher),
        )
        .await;
    let text_id = data["addPageToCourse"]["pages"][1]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let code = app
        .error_code(
            r#"mutation($pageId: ID!) {
                updateVideoPage(pageId: $pageId, questions: []) { id }
            }"#,
            json!({ "pageId": text_id }),
            Some(teacher),
        )
        .await;
    assert_eq!(code, "BAD_USER_INPUT");

    let code = app
        .error_code(
            r#"mutation($pageId: ID!) {
                updatePage(pageId: $pageId, explanation: "Nope") { id }
            }"#,
            json!({ "pageId": video_id }),
            Some(teacher),
        )
        .await;
    assert_eq!(code, "BAD_USER_INPUT");
}

#[tokio::test]
async fn test_page_course_lists_sibling_pages_in_order() {
    let app = TestApp::new();
    let teacher = app.register("tiago", "teacher").await;
    let course_id = app.create_course(teacher, "Ordered").await;
    let video_id = app.add_quiz_page(teacher, &course_id).await;

    let data = app
        .ok(
            r#"mutation($courseId: ID!) {
                addPageToCourse(courseId: $courseId, explanation: "Then read") { pages { id } }
            }"#,
            json!({ "courseId": course_id }),
            Some(teacher),
        )
        .await;
    let text_id = data["addPageToCourse"]["pages"][1]["id"].clone();

    let data = app
        .ok(
            r#"query($id: ID!) {
                page(id: $id) { position course { id title pages { id title } } }
            }"#,
            json!({ "id": text_id }),
            None,
        )
        .await;
    let page = &data["page"];
    assert_eq!(page["position"], 1);
    assert_eq!(page["course"]["id"], course_id);
    assert_eq!(page["course"]["title"], "Ordered");
    assert_eq!(
        page["course"]["pages"],
        json!([
            { "id": video_id, "title": "Video Page" },
            { "id": text_id, "title": "Step-by-Step" }
        ])
    );
}

#[tokio::test]
async fn test_update_course_overwrites_given_fields() {
    let app = TestApp::new();
    let teacher = app.register("tamsin", "teacher").await;
    let course_id = app.create_course(teacher, "Draft").await;

    let update = r#"mutation($id: ID!) {
        updateCourse(id: $id, title: "Final", image: "cover.png") { id title description image }
    }"#;
    let data = app
        .ok(update, json!({ "id": course_id }), Some(teacher))
        .await;
    assert_eq!(
        data["updateCourse"],
        json!({ "id": course_id, "title": "Final", "description": "Basics", "image": "cover.png" })
    );

    let code = app
        .error_code(update, json!({ "id": Uuid::new_v4().to_string() }), Some(teacher))
        .await;
    assert_eq!(code, "NOT_FOUND");
}

#[tokio::test]
async fn test_list_users_and_courses() {
    let app = TestApp::new();
    let teacher = app.register("tilda", "teacher").await;
    app.register("stella", "student").await;
    app.create_course(teacher, "One").await;
    app.create_course(teacher, "Two").await;

    let data = app
        .ok(
            "{ getUsers { username role } getCourses { title averageRating } }",
            json!({}),
            None,
        )
        .await;

    let mut usernames: Vec<&str> = data["getUsers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    usernames.sort_unstable();
    assert_eq!(usernames, vec!["stella", "tilda"]);

    assert_eq!(
        data["getCourses"],
        json!([
            { "title": "One", "averageRating": 0.0 },
            { "title": "Two", "averageRating": 0.0 }
        ])
    );
}

#[actix_web::test]
async fn test_http_login_then_me_with_bearer_token() {
    let app = TestApp::new();
    let user_id = app.register("http", "student").await;

    let service = test::init_service(
        App::new()
            .wrap(JwtMiddleware::new(app.jwt.clone()))
            .app_data(web::Data::new(app.schema.clone()))
            .configure(|cfg| handlers::configure(cfg, false)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/graphql")
        .set_json(json!({
            "query": r#"mutation { login(email: "http@example.com", password: "hunter22") { token } }"#
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    let token = body["data"]["login"]["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/graphql")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "query": "{ me { id username } }" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["data"]["me"]["id"], user_id.to_string());
    assert_eq!(body["data"]["me"]["username"], "http");

    let req = test::TestRequest::post()
        .uri("/graphql")
        .set_json(json!({ "query": "{ me { id } }" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert!(body["data"]["me"].is_null());

    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&service, req).await;
    assert_eq!(body, "ok");
}
