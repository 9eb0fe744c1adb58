// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Acknowledgment Policy
//!
//! A handler reports what should happen to a delivery through a
//! [`Disposition`]. [`finalize`] is the only place a disposition becomes a
//! broker call, so every delivery is settled by exactly one ack or nack.

use crate::errors::AckError;
use async_trait::async_trait;
use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicNackOptions},
};
#[cfg(test)]
use mockall::automock;

/// Outcome of processing one decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove the message from the queue.
    Accept,
    /// Recoverable failure; put the message back for redelivery.
    RejectRequeue,
    /// Permanent failure; drop the message, dead-lettering it if the queue has
    /// a dead-letter exchange.
    RejectDiscard,
}

/// Broker-level acknowledgment primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckAction {
    Ack,
    Nack { requeue: bool },
}

impl Disposition {
    pub fn action(self) -> AckAction {
        match self {
            Disposition::Accept => AckAction::Ack,
            Disposition::RejectRequeue => AckAction::Nack { requeue: true },
            Disposition::RejectDiscard => AckAction::Nack { requeue: false },
        }
    }
}

/// Settles a single delivery on the broker.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), AckError>;

    async fn nack(&self, requeue: bool) -> Result<(), AckError>;
}

#[async_trait]
impl Acknowledger for Acker {
    async fn ack(&self) -> Result<(), AckError> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map_err(|e| AckError::AckMessageError(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), AckError> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map_err(|e| AckError::NackMessageError(e.to_string()))
    }
}

/// Applies `disposition` to the delivery behind `acker`.
pub async fn finalize<A>(acker: &A, disposition: Disposition) -> Result<(), AckError>
where
    A: Acknowledger + ?Sized,
{
    match disposition.action() {
        AckAction::Ack => acker.ack().await,
        AckAction::Nack { requeue } => acker.nack(requeue).await,
    }
}
