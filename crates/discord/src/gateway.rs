//! Outbound chat surface.
//!
//! The engines never talk to the platform directly; everything outward
//! goes through [`ChatGateway`]. The real implementation lives with the
//! connection runtime, and tests use [`RecordingGateway`].

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use guildhall_core::domain::poll::MessageRef;
use guildhall_core::domain::profile::ChannelId;

use crate::embeds::MessageBody;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("chat platform rejected the call: {0}")]
    Platform(String),
    #[error("message reference is no longer valid: {0}")]
    StaleMessageRef(String),
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts a new message and returns the platform's handle for it.
    async fn create_message(
        &self,
        channel_id: &ChannelId,
        body: &MessageBody,
    ) -> Result<MessageRef, GatewayError>;

    /// Replaces the content of an existing message in place.
    async fn update_message(
        &self,
        message_ref: &MessageRef,
        body: &MessageBody,
    ) -> Result<(), GatewayError>;

    async fn send_text(&self, channel_id: &ChannelId, text: &str) -> Result<(), GatewayError>;

    /// Seeds a reaction symbol on a message so voters can click it.
    async fn add_reaction(
        &self,
        message_ref: &MessageRef,
        symbol: &str,
    ) -> Result<(), GatewayError>;
}

/// Transport stub used when no bot connection is configured: logs every
/// outbound call and hands out synthetic message refs so the rest of
/// the pipeline can run end to end.
#[derive(Debug, Default)]
pub struct NoopGateway {
    sequence: std::sync::atomic::AtomicU64,
}

impl NoopGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatGateway for NoopGateway {
    async fn create_message(
        &self,
        channel_id: &ChannelId,
        _body: &MessageBody,
    ) -> Result<MessageRef, GatewayError> {
        let sequence = self.sequence.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        let message_ref = MessageRef(format!("noop-{sequence}"));
        tracing::info!(channel = %channel_id.0, message_ref = %message_ref.0, "noop transport: create message");
        Ok(message_ref)
    }

    async fn update_message(
        &self,
        message_ref: &MessageRef,
        _body: &MessageBody,
    ) -> Result<(), GatewayError> {
        tracing::info!(message_ref = %message_ref.0, "noop transport: update message");
        Ok(())
    }

    async fn send_text(&self, channel_id: &ChannelId, text: &str) -> Result<(), GatewayError> {
        tracing::info!(channel = %channel_id.0, %text, "noop transport: send text");
        Ok(())
    }

    async fn add_reaction(
        &self,
        message_ref: &MessageRef,
        symbol: &str,
    ) -> Result<(), GatewayError> {
        tracing::info!(message_ref = %message_ref.0, %symbol, "noop transport: add reaction");
        Ok(())
    }
}

/// Records every outbound call for assertions; hands out sequential
/// message refs.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pub calls: Mutex<Vec<GatewayCall>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GatewayCall {
    CreateMessage { channel_id: ChannelId, body: MessageBody, assigned_ref: MessageRef },
    UpdateMessage { message_ref: MessageRef, body: MessageBody },
    SendText { channel_id: ChannelId, text: String },
    AddReaction { message_ref: MessageRef, symbol: String },
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: GatewayCall) {
        match self.calls.lock() {
            Ok(mut guard) => guard.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn create_message(
        &self,
        channel_id: &ChannelId,
        body: &MessageBody,
    ) -> Result<MessageRef, GatewayError> {
        let assigned_ref = MessageRef(format!("m-{}", self.calls().len() + 1));
        self.record(GatewayCall::CreateMessage {
            channel_id: channel_id.clone(),
            body: body.clone(),
            assigned_ref: assigned_ref.clone(),
        });
        Ok(assigned_ref)
    }

    async fn update_message(
        &self,
        message_ref: &MessageRef,
        body: &MessageBody,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::UpdateMessage {
            message_ref: message_ref.clone(),
            body: body.clone(),
        });
        Ok(())
    }

    async fn send_text(&self, channel_id: &ChannelId, text: &str) -> Result<(), GatewayError> {
        self.record(GatewayCall::SendText {
            channel_id: channel_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn add_reaction(
        &self,
        message_ref: &MessageRef,
        symbol: &str,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::AddReaction {
            message_ref: message_ref.clone(),
            symbol: symbol.to_string(),
        });
        Ok(())
    }
}
