//! Transactional email over SMTP.
//!
//! Only the password reset email is sent from this service; invoices go
//! through the invoice microservice.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    link: &'a str,
    expires_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    link: &'a str,
    expires_minutes: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Sends the emails the API needs.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a password reset link that stays valid for `expires_minutes`.
    async fn send_password_reset(
        &self,
        to: &str,
        link: &str,
        expires_minutes: i64,
    ) -> Result<(), EmailError>;
}

/// [`Mailer`] backed by an SMTP relay.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_password_reset(
        &self,
        to: &str,
        link: &str,
        expires_minutes: i64,
    ) -> Result<(), EmailError> {
        let html = PasswordResetHtml {
            link,
            expires_minutes,
        }
        .render()?;
        let text = PasswordResetText {
            link,
            expires_minutes,
        }
        .render()?;

        self.send_multipart_email(to, "Password reset request", text, html)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_text_contains_link() {
        let text = PasswordResetText {
            link: "http://localhost:4000/reset-password?email=a%40b.com&expires=1&hash=ff",
            expires_minutes: 60,
        }
        .render()
        .unwrap();

        assert!(text.contains("reset-password?email=a%40b.com&expires=1&hash=ff"));
        assert!(text.contains("60 minutes"));
    }

    #[test]
    fn test_reset_html_escapes_link() {
        let html = PasswordResetHtml {
            link: "http://localhost:4000/reset-password?email=a%40b.com&expires=1&hash=ff",
            expires_minutes: 60,
        }
        .render()
        .unwrap();

        assert!(html.contains("&amp;expires=1&amp;hash=ff"));
    }
}
