//! Course reminder endpoint
//!
//! POST /api/v1/reminders/course - Email a "finish your course" reminder

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::GatewayError;
use crate::metrics;
use crate::services::EmailService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReminderRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub course_title: String,
}

#[derive(Debug, Serialize)]
pub struct CourseReminderResponse {
    pub success: bool,
}

/// POST /api/v1/reminders/course
pub async fn send_course_reminder(
    email: web::Data<EmailService>,
    body: web::Json<CourseReminderRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = body.into_inner();
    let recipient = request.email.trim();
    let course_title = request.course_title.trim();

    if recipient.is_empty() || course_title.is_empty() {
        return Err(GatewayError::Validation(
            "Missing email or courseTitle".to_string(),
        ));
    }

    match email
        .send_finish_course_reminder(recipient, course_title)
        .await
    {
        Ok(()) => {
            metrics::record_reminder_email("course", true);
            info!(course_title, "Course reminder sent");
            Ok(HttpResponse::Ok().json(CourseReminderResponse { success: true }))
        }
        Err(e) => {
            metrics::record_reminder_email("course", false);
            error!(error = %e, "Failed to send course reminder");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RecordingMailer;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn email_data(mailer: Arc<RecordingMailer>) -> web::Data<EmailService> {
        web::Data::new(EmailService::new(mailer, "http://localhost:3000"))
    }

    #[actix_web::test]
    async fn test_sends_reminder() {
        let mailer = Arc::new(RecordingMailer::new());
        let app = test::init_service(
            App::new()
                .app_data(email_data(mailer.clone()))
                .configure(crate::rest_api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/reminders/course")
            .set_json(serde_json::json!({
                "email": "ada@example.com",
                "courseTitle": "Rust 101"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Reminder: Finish your course \"Rust 101\"");
    }

    #[actix_web::test]
    async fn test_missing_fields_rejected() {
        let mailer = Arc::new(RecordingMailer::new());
        let app = test::init_service(
            App::new()
                .app_data(email_data(mailer.clone()))
                .configure(crate::rest_api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/reminders/course")
            .set_json(serde_json::json!({ "email": "ada@example.com" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing email or courseTitle");
        assert!(mailer.sent().is_empty());
    }

    #[actix_web::test]
    async fn test_delivery_failure_is_500() {
        let mailer = Arc::new(RecordingMailer::new());
        mailer.fail_for("ada@example.com");
        let app = test::init_service(
            App::new()
                .app_data(email_data(mailer))
                .configure(crate::rest_api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/reminders/course")
            .set_json(serde_json::json!({
                "email": "ada@example.com",
                "courseTitle": "Rust 101"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
    }
}
