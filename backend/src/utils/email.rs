use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Outgoing account notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to_email: &str, reset_token: &str) -> Result<()>;

    async fn send_password_changed(&self, to_email: &str, display_name: &str) -> Result<()>;
}

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    frontend_url: String,
    skip_send: bool,
}

impl EmailService {
    pub fn new(smtp: &SmtpConfig, frontend_url: &str) -> Result<Self> {
        let mailer = if smtp.username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
                .port(smtp.port)
                .build()
        } else {
            let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
                .port(smtp.port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from_address: smtp.from_address.clone(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            skip_send: smtp.skip_send,
        })
    }

    pub fn reset_url(&self, reset_token: &str) -> String {
        format!("{}/reset-password/{}", self.frontend_url, reset_token)
    }

    async fn deliver(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        if self.skip_send {
            tracing::debug!(to = %to_email, subject, "SMTP_SKIP_SEND set, email not delivered");
            return Ok(());
        }
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_password_reset(&self, to_email: &str, reset_token: &str) -> Result<()> {
        let body = format!(
            r#"
We received a request to reset the password of your Bookstall account.

Open the following link to choose a new password:

{}

The link is valid for one hour.

If you did not request this, you can ignore this email.
"#,
            self.reset_url(reset_token)
        );
        self.deliver(to_email, "Reset your Bookstall password", body)
            .await
    }

    async fn send_password_changed(&self, to_email: &str, display_name: &str) -> Result<()> {
        let body = format!(
            r#"
Hi {},

The password of your Bookstall account was changed on {}.

If you did not make this change, reset your password right away.
"#,
            display_name,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.deliver(to_email, "Your Bookstall password was changed", body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@bookstall.local".into(),
            skip_send: true,
        }
    }

    #[tokio::test]
    async fn reset_url_points_at_frontend() {
        let service = EmailService::new(&smtp(), "http://localhost:5173/").unwrap();
        assert_eq!(
            service.reset_url("abc"),
            "http://localhost:5173/reset-password/abc"
        );
    }

    #[tokio::test]
    async fn skip_send_short_circuits_delivery() {
        let service = EmailService::new(&smtp(), "http://localhost:5173").unwrap();
        service
            .send_password_reset("reader@example.com", "token")
            .await
            .unwrap();
    }
}
