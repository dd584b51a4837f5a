pub mod email;

pub use email::{EmailService, Mailer, RecordingMailer, SentMail, SmtpMailer};
