//! Email service for OTP and password reset mail.
//!
//! Supports multiple email providers:
//! - `console`: Logs emails (development)
//! - `smtp`: Sends via an SMTP relay using lettre
//! - `sendgrid`: Uses the SendGrid v3 API

use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::EmailConfig;
use crate::middleware::metrics::record_email_sent;

const APP_NAME: &str = "LifeGuard";
const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Template rendering error: {0}")]
    TemplateError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    http: reqwest::Client,
    smtp: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    ///
    /// An SMTP relay that cannot be built is logged and reported as
    /// [`EmailError::NotConfigured`] on send.
    pub fn new(config: EmailConfig) -> Self {
        let smtp = if config.provider == "smtp" && !config.smtp_host.is_empty() {
            match build_smtp_transport(&config) {
                Ok(transport) => Some(transport),
                Err(e) => {
                    error!(host = %config.smtp_host, error = %e, "Failed to build SMTP transport");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            smtp,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message. A disabled service drops the message.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.is_enabled() {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "smtp" => self.send_smtp(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Send the current verification code.
    pub async fn send_otp_email(
        &self,
        to_email: &str,
        code: &str,
        valid_secs: u64,
    ) -> Result<(), EmailError> {
        let subject = format!("Your OTP for {}", APP_NAME);

        let body_text = format!(
            r#"Hello,

Your One-Time Password (OTP) for {app} is: {code}

Please use this code to complete your verification process.
Note: This code will expire in {secs} seconds.

If you did not request this code, please ignore this email or contact support.

Thank you,
{app} Support Team"#,
            app = APP_NAME,
            code = code,
            secs = valid_secs
        );

        let body_html = self.html_enabled().then(|| {
            format!(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333; line-height: 1.6;">
    <p>Hello,</p>
    <p>Your One-Time Password (OTP) for <strong>{app}</strong> is:
       <span style="font-weight: bold; color: #d64;">{code}</span></p>
    <p>Please use this code to complete your verification process.
       Note: This code will expire in {secs} seconds.</p>
    <p>If you did not request this code, please ignore this email or contact support.</p>
    <p style="font-size: 0.9em;">Thank you,<br><strong>{app} Support Team</strong></p>
</body>
</html>"#,
                app = APP_NAME,
                code = code,
                secs = valid_secs
            )
        });

        let result = self
            .send(EmailMessage {
                to: to_email.to_string(),
                to_name: None,
                subject,
                body_text,
                body_html,
            })
            .await;
        record_email_sent("otp", result.is_ok());
        result
    }

    /// Send a password reset link.
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        reset_token: &str,
        expiry_hours: i64,
    ) -> Result<(), EmailError> {
        let reset_url = reset_link(&self.config.reset_url, to_email, reset_token)?;

        let body_text = format!(
            r#"Hi{name},

We received a request to reset your {app} password. Open the link below to choose a new one:

{url}

This link will expire in {hours} hours and can be used once.

If you didn't request a password reset, you can safely ignore this email."#,
            name = to_name.map(|n| format!(" {}", n)).unwrap_or_default(),
            app = APP_NAME,
            url = reset_url,
            hours = expiry_hours
        );

        let body_html = self.html_enabled().then(|| {
            format!(
                r#"<p>Please reset your password by clicking <a href='{url}'>here</a>.</p>
<p style="color: #666; font-size: 14px;">This link will expire in {hours} hours.</p>"#,
                url = reset_url,
                hours = expiry_hours
            )
        });

        let result = self
            .send(EmailMessage {
                to: to_email.to_string(),
                to_name: to_name.map(|s| s.to_string()),
                subject: "Reset Password".to_string(),
                body_text,
                body_html,
            })
            .await;
        record_email_sent("password_reset", result.is_ok());
        result
    }

    fn html_enabled(&self) -> bool {
        self.config.template_style == "html"
    }

    fn sender(&self) -> Result<Mailbox, EmailError> {
        let address = self
            .config
            .sender_email
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.config.sender_email.clone()))?;
        Ok(Mailbox::new(Some(self.config.sender_name.clone()), address))
    }

    /// Console provider - logs email (for development).
    async fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            to_name = ?message.to_name,
            subject = %message.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        info!(body_text = %message.body_text, "Email body (plain text)");
        Ok(())
    }

    /// SMTP provider - sends through the configured relay.
    async fn send_smtp(&self, message: EmailMessage) -> Result<(), EmailError> {
        let transport = self.smtp.as_ref().ok_or(EmailError::NotConfigured)?;

        let recipient_address = message
            .to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(message.to.clone()))?;
        let recipient = Mailbox::new(message.to_name.clone(), recipient_address);

        let builder = Message::builder()
            .from(self.sender()?)
            .to(recipient)
            .subject(message.subject.clone());

        let email = match message.body_html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.body_text.clone(),
                html,
            )),
            None => builder.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(message.body_text.clone()),
            ),
        }
        .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        transport
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(format!("SMTP send failed: {}", e)))?;

        info!(to = %message.to, subject = %message.subject, "Email sent via SMTP");
        Ok(())
    }

    /// SendGrid provider - sends via SendGrid API.
    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let mut recipient = serde_json::json!({ "email": message.to });
        if let Some(name) = &message.to_name {
            recipient["name"] = serde_json::json!(name);
        }

        let mut content = vec![serde_json::json!({
            "type": "text/plain",
            "value": message.body_text
        })];
        if let Some(html) = &message.body_html {
            content.push(serde_json::json!({
                "type": "text/html",
                "value": html
            }));
        }

        let body = serde_json::json!({
            "personalizations": [{ "to": [recipient] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": content
        });

        let response = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

fn build_smtp_transport(
    config: &EmailConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
    let builder = if config.smtp_use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);
    let builder = if config.smtp_username.is_empty() {
        builder
    } else {
        builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ))
    };

    Ok(builder.build())
}

/// `{base}/reset-password?email=..&token=..` with the query encoded.
fn reset_link(base: &str, email: &str, token: &str) -> Result<Url, EmailError> {
    let page = format!("{}/reset-password", base.trim_end_matches('/'));
    Url::parse_with_params(&page, &[("email", email), ("token", token)])
        .map_err(|e| EmailError::TemplateError(format!("Invalid reset URL: {}", e)))
}
