use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};

pub struct EmailService;

impl EmailService {
    pub async fn send_welcome_email(email: &str, name: &str) -> bool {
        match Self::try_send_welcome(email, name).await {
            Ok(_) => {
                info!("Welcome email sent to {}", email);
                true
            }
            Err(e) => {
                error!("Failed to send welcome email to {}: {}", email, e);
                false
            }
        }
    }

    async fn try_send_welcome(email: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
        let display_name = if name.is_empty() { "there" } else { name };

        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h1>Welcome to ApplyHub!</h1>
                <p>Hi {},</p>
                <p>Your account is ready. Pick a plan and we will start applying on your behalf:</p>
                <ul>
                    <li>Track every application across its pipeline stage</li>
                    <li>Get notified when a batch of applications completes</li>
                    <li>Score your CV and generate tailored cover letters</li>
                </ul>
                <p>Best regards,<br><strong>The ApplyHub Team</strong></p>
            </body>
            </html>
            "#,
            display_name
        );

        Self::send(email, "Welcome to ApplyHub!", body).await
    }

    pub async fn send_batch_completed_email(email: &str, batch_number: i64, total: i64) -> bool {
        match Self::try_send_batch_completed(email, batch_number, total).await {
            Ok(_) => {
                info!("Batch completion email sent to {}", email);
                true
            }
            Err(e) => {
                error!("Failed to send batch completion email to {}: {}", email, e);
                false
            }
        }
    }

    async fn try_send_batch_completed(
        email: &str,
        batch_number: i64,
        total: i64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h1>Batch #{} completed</h1>
                <p>All {} applications in this batch have been submitted.</p>
                <p>Log in to your dashboard to follow their progress.</p>
                <p>Best regards,<br><strong>The ApplyHub Team</strong></p>
            </body>
            </html>
            "#,
            batch_number, total
        );

        Self::send(email, &format!("Your application batch #{} is complete", batch_number), body)
            .await
    }

    async fn send(to: &str, subject: &str, body: String) -> Result<(), Box<dyn std::error::Error>> {
        let mail_user = crate::config::Config::mail_user();
        let mail_password = crate::config::Config::mail_password();

        if mail_user.is_empty() || mail_password.is_empty() {
            warn!("Email credentials not configured. Skipping email send.");
            return Err("Email not configured".into());
        }

        let from_mailbox: Mailbox = crate::config::Config::mail_from().parse()?;
        let to_mailbox: Mailbox = to.parse()?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        let creds = Credentials::new(mail_user, mail_password);
        let mailer = SmtpTransport::relay(&crate::config::Config::mail_host())?
            .credentials(creds)
            .build();

        mailer.send(&message)?;
        Ok(())
    }
}
