/// REST endpoints served next to the GraphQL API
///
/// `POST /api/v1/reminders/course` sends a "finish your course" email.
pub mod reminders;

use actix_web::web;

pub use reminders::send_course_reminder;

/// Register the REST routes under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/reminders/course", web::post().to(reminders::send_course_reminder)),
    );
}
