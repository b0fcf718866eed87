//! NATS publisher for prediction replies

use crate::error::PredictError;
use crate::types::prediction::PredictionResult;
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reply sent when a request cannot be answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Machine-readable error kind, e.g. `unmapped_grade`
    pub error: String,
    pub message: String,
}

impl ErrorReply {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

impl From<&PredictError> for ErrorReply {
    fn from(err: &PredictError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Publisher for prediction results
#[derive(Clone)]
pub struct ResultProducer {
    client: Client,
    subject: String,
}

impl ResultProducer {
    /// `subject` receives replies for requests without a reply inbox
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a prediction result
    pub async fn publish(&self, reply_to: Option<Subject>, result: &PredictionResult) -> Result<()> {
        let payload = serde_json::to_vec(result)?;
        self.send(reply_to, payload).await?;

        debug!(
            prediction_id = %result.prediction_id,
            label = %result.label,
            "Published prediction"
        );
        Ok(())
    }

    /// Publish an error reply
    pub async fn publish_error(&self, reply_to: Option<Subject>, reply: &ErrorReply) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;
        self.send(reply_to, payload).await?;

        debug!(error = %reply.error, "Published error reply");
        Ok(())
    }

    async fn send(&self, reply_to: Option<Subject>, payload: Vec<u8>) -> Result<()> {
        let subject = reply_to.unwrap_or_else(|| Subject::from(self.subject.as_str()));
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
