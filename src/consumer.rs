// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Consumer
//!
//! The per-delivery step of a subscription: decode the payload, run the
//! handler, settle the delivery. Whatever happens in between (a payload that
//! does not decode, a handler that panics) resolves to a [`Disposition`], so
//! each delivery reaches [`finalize`] exactly once.

use crate::{
    ack::{finalize, Acknowledger, Disposition},
    codec::{Codec, Envelope},
    errors::AckError,
    otel,
};
use futures_util::{Stream, StreamExt};
use lapin::{acker::Acker, message::Delivery, protocol::basic::AMQPProperties};
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{Span, Status},
};
use serde::de::DeserializeOwned;
use std::{
    borrow::Cow,
    panic::{catch_unwind, AssertUnwindSafe},
};
use tracing::{debug, error, warn};

/// Processes one decoded message and decides how to settle it.
///
/// Handlers run on the subscription's task, one message at a time, and should
/// return quickly: a slow handler holds up every message behind it on the
/// same queue.
pub trait Handler<T>: Send + Sync + 'static {
    fn handle(&self, value: T) -> Disposition;
}

impl<T, F> Handler<T> for F
where
    F: Fn(T) -> Disposition + Send + Sync + 'static,
{
    fn handle(&self, value: T) -> Disposition {
        self(value)
    }
}

/// A message received from the broker that has not been settled yet.
pub(crate) trait Inbound: Send {
    type Acker: Acknowledger;

    fn properties(&self) -> &AMQPProperties;

    fn routing_key(&self) -> &str;

    fn into_parts(self) -> (Vec<u8>, Self::Acker);
}

impl Inbound for Delivery {
    type Acker = Acker;

    fn properties(&self) -> &AMQPProperties {
        &self.properties
    }

    fn routing_key(&self) -> &str {
        self.routing_key.as_str()
    }

    fn into_parts(self) -> (Vec<u8>, Acker) {
        (self.data, self.acker)
    }
}

/// Decodes `envelope` and runs `handler` on the result.
///
/// Undecodable payloads are discarded since redelivering them can never
/// succeed. A panicking handler is treated the same way.
pub(crate) fn dispose<T, C, H>(codec: &C, handler: &H, envelope: &Envelope) -> Disposition
where
    T: DeserializeOwned,
    C: Codec,
    H: Handler<T>,
{
    let value = match codec.decode::<T>(envelope) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                error = err.to_string(),
                "could not decode message, discarding"
            );
            return Disposition::RejectDiscard;
        }
    };

    match catch_unwind(AssertUnwindSafe(|| handler.handle(value))) {
        Ok(disposition) => disposition,
        Err(_) => {
            error!("handler panicked, discarding message");
            Disposition::RejectDiscard
        }
    }
}

/// Runs the full decode, handle and settle cycle for one delivery.
pub(crate) async fn consume<T, C, H, D>(
    tracer: &BoxedTracer,
    queue: &str,
    codec: &C,
    handler: &H,
    delivery: D,
) -> Result<Disposition, AckError>
where
    T: DeserializeOwned,
    C: Codec,
    H: Handler<T>,
    D: Inbound,
{
    let mut span = otel::new_span(delivery.properties(), tracer, queue);

    let content_type = delivery
        .properties()
        .content_type()
        .as_ref()
        .map(|ct| ct.as_str().to_owned())
        .unwrap_or_default();

    debug!(
        queue,
        routing_key = delivery.routing_key(),
        content_type = content_type.as_str(),
        "received message"
    );

    let (payload, acker) = delivery.into_parts();
    let disposition = dispose(codec, handler, &Envelope::new(content_type, payload));

    match disposition {
        Disposition::Accept => span.set_status(Status::Ok),
        Disposition::RejectRequeue => {
            warn!(queue, "message rejected, requeuing");
            span.set_status(Status::Error {
                description: Cow::from("message requeued"),
            });
        }
        Disposition::RejectDiscard => {
            warn!(queue, "message rejected, discarding");
            span.set_status(Status::Error {
                description: Cow::from("message discarded"),
            });
        }
    }

    if let Err(err) = finalize(&acker, disposition).await {
        span.record_error(&err);
        return Err(err);
    }

    Ok(disposition)
}

/// Consumes `stream` until it ends, settling each delivery in receipt order.
pub(crate) async fn drain<T, C, H, D, S, E>(stream: S, queue: &str, codec: &C, handler: &H)
where
    T: DeserializeOwned,
    C: Codec,
    H: Handler<T>,
    D: Inbound,
    S: Stream<Item = Result<D, E>> + Unpin,
    E: std::fmt::Display,
{
    let tracer = global::tracer("amqp consumer");
    let mut stream = stream;

    while let Some(result) = stream.next().await {
        match result {
            Ok(delivery) => {
                let result = consume::<T, C, H, D>(&tracer, queue, codec, handler, delivery).await;
                if let Err(err) = result {
                    error!(error = err.to_string(), queue, "error consume msg");
                }
            }

            Err(err) => error!(error = err.to_string(), queue, "errors consume msg"),
        }
    }

    debug!(queue, "consumer stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ack::{AckAction, MockAcknowledger},
        codec::{BincodeCodec, JsonCodec, JSON_CONTENT_TYPE},
        routing::PlayingState,
    };
    use async_trait::async_trait;
    use futures_util::stream;
    use lapin::types::ShortString;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(u64, AckAction)>>>;

    struct RecordingAcker {
        tag: u64,
        log: Log,
    }

    #[async_trait]
    impl Acknowledger for RecordingAcker {
        async fn ack(&self) -> Result<(), AckError> {
            self.log.lock().unwrap().push((self.tag, AckAction::Ack));
            Ok(())
        }

        async fn nack(&self, requeue: bool) -> Result<(), AckError> {
            self.log
                .lock()
                .unwrap()
                .push((self.tag, AckAction::Nack { requeue }));
            Ok(())
        }
    }

    struct FakeDelivery<A> {
        properties: AMQPProperties,
        payload: Vec<u8>,
        acker: A,
    }

    impl<A: Acknowledger> Inbound for FakeDelivery<A> {
        type Acker = A;

        fn properties(&self) -> &AMQPProperties {
            &self.properties
        }

        fn routing_key(&self) -> &str {
            "pause"
        }

        fn into_parts(self) -> (Vec<u8>, A) {
            (self.payload, self.acker)
        }
    }

    fn json_delivery<A>(payload: &[u8], acker: A) -> FakeDelivery<A> {
        FakeDelivery {
            properties: AMQPProperties::default()
                .with_content_type(ShortString::from(JSON_CONTENT_TYPE)),
            payload: payload.to_vec(),
            acker,
        }
    }

    fn recorded(log: &Log, tag: u64, payload: &[u8]) -> FakeDelivery<RecordingAcker> {
        json_delivery(
            payload,
            RecordingAcker {
                tag,
                log: log.clone(),
            },
        )
    }

    fn accept_all(_: PlayingState) -> Disposition {
        Disposition::Accept
    }

    #[test]
    fn dispose_returns_handler_decision() {
        let envelope = JsonCodec.encode(&PlayingState { is_paused: true }).unwrap();
        let handler = |state: PlayingState| {
            if state.is_paused {
                Disposition::RejectRequeue
            } else {
                Disposition::Accept
            }
        };

        assert_eq!(
            dispose::<PlayingState, _, _>(&JsonCodec, &handler, &envelope),
            Disposition::RejectRequeue
        );
    }

    #[test]
    fn dispose_discards_undecodable_payload() {
        let envelope = Envelope::new(JSON_CONTENT_TYPE, b"not json".to_vec());
        let handler = |_: PlayingState| -> Disposition { panic!("must not be called") };

        assert_eq!(
            dispose::<PlayingState, _, _>(&JsonCodec, &handler, &envelope),
            Disposition::RejectDiscard
        );
    }

    #[test]
    fn dispose_discards_payload_from_other_codec() {
        let envelope = JsonCodec.encode(&PlayingState { is_paused: true }).unwrap();

        assert_eq!(
            dispose::<PlayingState, _, _>(&BincodeCodec, &accept_all, &envelope),
            Disposition::RejectDiscard
        );
    }

    #[test]
    fn dispose_discards_when_handler_panics() {
        let envelope = JsonCodec.encode(&PlayingState { is_paused: true }).unwrap();
        let handler = |_: PlayingState| -> Disposition { panic!("boom") };

        assert_eq!(
            dispose::<PlayingState, _, _>(&JsonCodec, &handler, &envelope),
            Disposition::RejectDiscard
        );
    }

    #[tokio::test]
    async fn consume_acks_accepted_message_once() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().times(1).returning(|| Ok(()));
        acker.expect_nack().never();

        let disposition = consume::<PlayingState, _, _, _>(
            &global::tracer("test"),
            "pause.alice",
            &JsonCodec,
            &accept_all,
            json_delivery(br#"{"is_paused":true}"#, acker),
        )
        .await
        .unwrap();

        assert_eq!(disposition, Disposition::Accept);
    }

    #[tokio::test]
    async fn consume_discards_malformed_message_once() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().never();
        acker
            .expect_nack()
            .with(mockall::predicate::eq(false))
            .times(1)
            .returning(|_| Ok(()));

        let disposition = consume::<PlayingState, _, _, _>(
            &global::tracer("test"),
            "pause.alice",
            &JsonCodec,
            &accept_all,
            json_delivery(b"{", acker),
        )
        .await
        .unwrap();

        assert_eq!(disposition, Disposition::RejectDiscard);
    }

    #[tokio::test]
    async fn consume_surfaces_ack_failure() {
        let mut acker = MockAcknowledger::new();
        acker
            .expect_ack()
            .times(1)
            .returning(|| Err(AckError::AckMessageError("channel closed".to_owned())));

        let result = consume::<PlayingState, _, _, _>(
            &global::tracer("test"),
            "pause.alice",
            &JsonCodec,
            &accept_all,
            json_delivery(br#"{"is_paused":false}"#, acker),
        )
        .await;

        assert_eq!(
            result,
            Err(AckError::AckMessageError("channel closed".to_owned()))
        );
    }

    #[tokio::test]
    async fn drain_settles_every_delivery_in_order() {
        let log: Log = Arc::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let deliveries = vec![
            Ok(recorded(&log, 1, br#"{"is_paused":true}"#)),
            Ok(recorded(&log, 2, b"garbage")),
            Err("connection reset"),
            Ok(recorded(&log, 3, br#"{"is_paused":false}"#)),
            Ok(recorded(&log, 4, br#"{"is_paused":true}"#)),
        ];

        let handler = {
            let seen = seen.clone();
            move |state: PlayingState| {
                let mut seen = seen.lock().unwrap();
                seen.push(state.is_paused);
                match seen.len() {
                    1 => Disposition::Accept,
                    2 => Disposition::RejectRequeue,
                    _ => Disposition::RejectDiscard,
                }
            }
        };

        drain::<PlayingState, _, _, _, _, _>(
            stream::iter(deliveries),
            "pause.alice",
            &JsonCodec,
            &handler,
        )
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![true, false, true]);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (1, AckAction::Ack),
                (2, AckAction::Nack { requeue: false }),
                (3, AckAction::Nack { requeue: true }),
                (4, AckAction::Nack { requeue: false }),
            ]
        );
    }

    #[tokio::test]
    async fn drain_keeps_going_after_handler_panic() {
        let log: Log = Arc::default();
        let deliveries: Vec<Result<_, &str>> = vec![
            Ok(recorded(&log, 1, br#"{"is_paused":true}"#)),
            Ok(recorded(&log, 2, br#"{"is_paused":false}"#)),
        ];

        let handler = |state: PlayingState| {
            if state.is_paused {
                panic!("cannot pause twice");
            }
            Disposition::Accept
        };

        drain::<PlayingState, _, _, _, _, _>(
            stream::iter(deliveries),
            "pause.alice",
            &JsonCodec,
            &handler,
        )
        .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![(1, AckAction::Nack { requeue: false }), (2, AckAction::Ack)]
        );
    }
}
