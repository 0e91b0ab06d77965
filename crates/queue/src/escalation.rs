//! Operator escalation for exhausted deliveries.
//!
//! Escalation is best-effort: a sink that fails is logged and never retried,
//! and the failure never reaches the worker that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use eventrelay_common::{EscalationConfig, SmtpConfig};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::retry::ExhaustedDelivery;

/// Escalation error type.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// An address could not be parsed.
    #[error("Invalid address: {0}")]
    Address(String),

    /// The message could not be built.
    #[error("Invalid message: {0}")]
    Message(String),

    /// The SMTP relay failed.
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Receives escalations.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    /// Notify an operator.
    async fn notify(&self, subject: &str, body: &str) -> Result<(), EscalationError>;
}

/// Logs escalations instead of sending them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEscalation;

#[async_trait]
impl EscalationSink for LogEscalation {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), EscalationError> {
        error!(subject, body, "Escalation");
        Ok(())
    }
}

/// Mails escalations to an operator through an SMTP relay.
#[derive(Clone)]
pub struct SmtpEscalation {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpEscalation {
    /// Create a sink that relays through `smtp` using STARTTLS.
    pub fn new(smtp: &SmtpConfig, from: &str, to: &str) -> Result<Self, EscalationError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| EscalationError::Address(format!("{from}: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| EscalationError::Address(format!("{to}: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| EscalationError::Smtp(e.to_string()))?
            .port(smtp.port);

        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }
}

#[async_trait]
impl EscalationSink for SmtpEscalation {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), EscalationError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EscalationError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EscalationError::Smtp(e.to_string()))?;

        info!(to = %self.to, subject, "Escalation mail sent");
        Ok(())
    }
}

/// Pick the sink for the given configuration: SMTP when a relay and an admin
/// address are configured, logging otherwise.
pub fn build_escalation(
    config: &EscalationConfig,
) -> Result<Arc<dyn EscalationSink>, EscalationError> {
    match (&config.smtp, &config.admin_email) {
        (Some(smtp), Some(admin)) => Ok(Arc::new(SmtpEscalation::new(
            smtp,
            &config.from_address,
            admin,
        )?)),
        _ => {
            warn!("No SMTP escalation configured, exhausted deliveries will only be logged");
            Ok(Arc::new(LogEscalation))
        }
    }
}

/// Send an exhausted delivery to the sink, logging any failure.
pub async fn escalate(sink: &dyn EscalationSink, exhausted: &ExhaustedDelivery) {
    warn!(
        user_id = %exhausted.event.user_id,
        attempts = exhausted.attempts,
        failed_at = %exhausted.failed_at,
        "Retries exhausted, escalating"
    );

    let body = exhausted.body();
    if let Err(e) = sink.notify(exhausted.subject(), &body).await {
        error!(
            error = %e,
            user_id = %exhausted.event.user_id,
            attempts = exhausted.attempts,
            failed_at = %exhausted.failed_at,
            "Failed to notify operator"
        );
    }
}
