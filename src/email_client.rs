/// Outbound email delivery.
///
/// Thin HTTP client against the mail provider's REST API. Delivery is
/// best-effort at every call site: the verification code can be re-sent, so
/// a provider outage never fails a registration.
use serde::Serialize;

use crate::configuration::EmailSettings;
use crate::error::AppError;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: String,
    authorization_token: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

impl EmailClient {
    pub fn new(settings: &EmailSettings) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: settings.base_url.clone(),
            sender: settings.sender.clone(),
            authorization_token: settings.authorization_token.clone(),
        }
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        text_body: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            from: &self.sender,
            to: recipient,
            subject,
            text_body,
        };

        self.http_client
            .post(&url)
            .header("X-Server-Token", &self.authorization_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("Email service error: {}", e)))?;

        Ok(())
    }

    /// Compose and send the registration verification mail
    pub async fn send_verification_code(
        &self,
        recipient: &str,
        first_name: &str,
        code: &str,
    ) -> Result<(), AppError> {
        let subject = "Verify your email";
        let body = format!(
            "Hi {},\n\n\
             Welcome aboard.\n\n\
             Your email verification code is:\n\n\
             {}\n\n\
             This code expires in 15 minutes.",
            first_name, code
        );

        self.send_email(recipient, subject, &body).await
    }
}
