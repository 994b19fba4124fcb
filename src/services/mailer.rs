//! Outbound email over SMTP

use std::time::Duration;

use anyhow::{Context, Result};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, warn};

use crate::config::SmtpConfig;

const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Rendered message ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

impl Email {
    pub fn welcome(user_id: i64, activation_token: &str) -> Self {
        let plain = format!(
            "Hi,\n\nThanks for signing up for a Greenlight account. We're excited to have you on board!\n\n\
             For future reference, your user ID number is {user_id}.\n\n\
             Please send a request to the `PUT /v1/users/activated` endpoint with the following JSON \
             body to activate your account:\n\n{{\"token\": \"{activation_token}\"}}\n\n\
             Please note that this is a one-time use token and it will expire in 3 days.\n\nThanks,\n\nThe Greenlight Team"
        );
        let html = format!(
            "<p>Hi,</p><p>Thanks for signing up for a Greenlight account. We're excited to have you on board!</p>\
             <p>For future reference, your user ID number is {user_id}.</p>\
             <p>Please send a request to the <code>PUT /v1/users/activated</code> endpoint with the following JSON \
             body to activate your account:</p><pre><code>{{\"token\": \"{activation_token}\"}}</code></pre>\
             <p>Please note that this is a one-time use token and it will expire in 3 days.</p>\
             <p>Thanks,</p><p>The Greenlight Team</p>"
        );
        Self {
            subject: "Welcome to Greenlight!".to_string(),
            plain,
            html,
        }
    }

    pub fn activation(activation_token: &str) -> Self {
        let plain = format!(
            "Hi,\n\nPlease send a `PUT /v1/users/activated` request with the following JSON body to \
             activate your account:\n\n{{\"token\": \"{activation_token}\"}}\n\n\
             Please note that this is a one-time use token and it will expire in 3 days.\n\nThanks,\n\nThe Greenlight Team"
        );
        let html = format!(
            "<p>Hi,</p><p>Please send a <code>PUT /v1/users/activated</code> request with the following JSON body \
             to activate your account:</p><pre><code>{{\"token\": \"{activation_token}\"}}</code></pre>\
             <p>Please note that this is a one-time use token and it will expire in 3 days.</p>\
             <p>Thanks,</p><p>The Greenlight Team</p>"
        );
        Self {
            subject: "Activate your Greenlight account".to_string(),
            plain,
            html,
        }
    }

    pub fn password_reset(reset_token: &str) -> Self {
        let plain = format!(
            "Hi,\n\nPlease send a `PUT /v1/users/password` request with the following JSON body to set a \
             new password:\n\n{{\"password\": \"your new password\", \"token\": \"{reset_token}\"}}\n\n\
             Please note that this is a one-time use token and it will expire in 45 minutes. If you need \
             another token please make a `POST /v1/tokens/password-reset` request.\n\nThanks,\n\nThe Greenlight Team"
        );
        let html = format!(
            "<p>Hi,</p><p>Please send a <code>PUT /v1/users/password</code> request with the following JSON body \
             to set a new password:</p>\
             <pre><code>{{\"password\": \"your new password\", \"token\": \"{reset_token}\"}}</code></pre>\
             <p>Please note that this is a one-time use token and it will expire in 45 minutes. If you need \
             another token please make a <code>POST /v1/tokens/password-reset</code> request.</p>\
             <p>Thanks,</p><p>The Greenlight Team</p>"
        );
        Self {
            subject: "Reset your Greenlight password".to_string(),
            plain,
            html,
        }
    }
}

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let sender = config
            .sender
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid SMTP sender: {}", config.sender))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP host: {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(5)))
            .build();

        Ok(Self { transport, sender })
    }

    /// Send `email` to `recipient`, retrying a few times on failure
    pub async fn send(&self, recipient: &str, email: &Email) -> Result<()> {
        let to = recipient
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient: {}", recipient))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.plain.clone(),
                email.html.clone(),
            ))
            .context("Failed to build email")?;

        let mut attempt = 1;
        loop {
            match self.transport.send(message.clone()).await {
                Ok(_) => {
                    debug!(recipient, subject = %email.subject, attempt, "Email sent");
                    return Ok(());
                }
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!(recipient, attempt, error = %e, "Email send failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to send email after {} attempts", SEND_ATTEMPTS)
                    })
                }
            }
        }
    }
}
