/// Outbound email for welcome messages and reminders
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::error::{GatewayError, Result};

/// Delivery backend for rendered HTML messages
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Async SMTP transport wrapper (SMTP or no-op)
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// If the SMTP host is empty the mailer runs in no-op mode and only logs.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| GatewayError::Internal(format!("Invalid SMTP_FROM address: {}", e)))?;

        let transport = if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; email service will operate in no-op mode");
            None
        } else {
            let builder = if config.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            }
            .map_err(|e| {
                GatewayError::Internal(format!("Failed to configure SMTP transport: {}", e))
            })?
            .port(config.smtp_port);

            let builder = if let (Some(username), Some(password)) =
                (&config.smtp_username, &config.smtp_password)
            {
                builder.credentials(Credentials::new(username.to_string(), password.to_string()))
            } else {
                builder
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(
                subject,
                recipient, "Email service running in no-op mode; skipping actual send"
            );
            return Ok(());
        };

        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| GatewayError::Email(format!("Invalid recipient address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| GatewayError::Email(format!("Failed to build email message: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| GatewayError::Email(e.to_string()))?;
        info!(subject, "email sent successfully");
        Ok(())
    }
}

/// A message captured by [`RecordingMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

/// Keeps messages in memory instead of delivering them
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail_for: Mutex<Vec<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `recipient` fail
    pub fn fail_for(&self, recipient: &str) {
        if let Ok(mut list) = self.fail_for.lock() {
            list.push(recipient.to_string());
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_html(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        let rejected = self
            .fail_for
            .lock()
            .map(|list| list.iter().any(|r| r == recipient))
            .unwrap_or(false);
        if rejected {
            return Err(GatewayError::Email(format!("delivery to {recipient} refused")));
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| GatewayError::Internal("mailer lock poisoned".to_string()))?;
        sent.push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the LearningPulse emails and hands them to a [`Mailer`]
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    app_base_url: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, app_base_url: impl Into<String>) -> Self {
        Self {
            mailer,
            app_base_url: app_base_url.into(),
        }
    }

    /// Build the SMTP-backed service from configuration
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let mailer = SmtpMailer::new(config)?;
        Ok(Self::new(Arc::new(mailer), config.app_base_url.clone()))
    }

    pub async fn send_welcome_email(&self, recipient: &str, username: &str) -> Result<()> {
        let body = format!(
            "<h1>Welcome, {name}!</h1>\
             <p>Your LearningPulse account is ready.</p>\
             <p>Browse the course catalogue and start learning today.</p>\
             <a href=\"{url}\">Explore courses</a>",
            name = escape_html(username),
            url = self.app_base_url,
        );
        self.mailer
            .send_html(recipient, "Welcome to Our Platform!", &body)
            .await
    }

    pub async fn send_course_reminder(
        &self,
        recipient: &str,
        username: &str,
        course_title: &str,
    ) -> Result<()> {
        let subject = format!("Don't forget to complete {course_title}");
        let body = format!(
            "<h1>Hi {name},</h1>\
             <p>You have not finished <strong>{title}</strong> yet.</p>\
             <p>Pick up where you left off and complete the course.</p>\
             <a href=\"{url}\">Go to Courses</a>",
            name = escape_html(username),
            title = escape_html(course_title),
            url = self.app_base_url,
        );
        self.mailer.send_html(recipient, &subject, &body).await
    }

    pub async fn send_login_reminder(&self, recipient: &str, username: &str) -> Result<()> {
        let body = format!(
            "<h1>Hey {name},</h1>\
             <p>It has been a while since your last visit.</p>\
             <p>Your courses are waiting for you.</p>\
             <a href=\"{url}\">Return to LearningPulse</a>",
            name = escape_html(username),
            url = self.app_base_url,
        );
        self.mailer
            .send_html(recipient, "We miss you at LearningPulse!", &body)
            .await
    }

    /// Reminder requested through the REST helper, where only the address is known
    pub async fn send_finish_course_reminder(
        &self,
        recipient: &str,
        course_title: &str,
    ) -> Result<()> {
        let subject = format!("Reminder: Finish your course \"{course_title}\"");
        let body = format!(
            "<h1>Hey there!</h1>\
             <p>You started the course \"{title}\" but have not completed it yet.</p>\
             <p>Come back and finish it!</p>",
            title = escape_html(course_title),
        );
        self.mailer.send_html(recipient, &subject, &body).await
    }
}
