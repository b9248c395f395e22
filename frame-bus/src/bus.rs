/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use crate::channels::{ChannelRegistry, ChannelStream};
use crate::fault::BusFault;
use crate::model::{Message, MessageId, MessageKind, Payload};
use crate::observability::{events, DropReason, Monitor, MonitorEvent, MonitorStream};
use crate::streams::{lock_unpoisoned, StreamObserver, Subscription};
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const BUS_TAG: &str = "EventBus:";
const BUS_FN_SEND_TAG: &str = "send():";
const BUS_FN_REQUEST_TAG: &str = "request():";
const BUS_FN_LISTEN_TAG: &str = "listen():";

/// Construction-time knobs for one bus instance.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Whether monitor records are constructed and emitted.
    pub monitoring_enabled: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
        }
    }
}

struct BusInner {
    name: String,
    instance_id: String,
    registry: Arc<ChannelRegistry>,
    monitor: Arc<Monitor>,
}

/// The publish/subscribe kernel.
///
/// All state lives behind an `Arc`, so the bus clones cheaply into handlers,
/// facades and the proxy. Emission is synchronous: every subscriber of a
/// publication runs before the publish call returns, in subscription order.
/// The kernel spawns no threads and never blocks.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, BusConfig::default())
    }

    pub fn with_config(name: &str, config: BusConfig) -> Self {
        let monitor = Arc::new(Monitor::new(config.monitoring_enabled));
        let instance_id = format!("{name}-{}", Uuid::new_v4().as_hyphenated());
        debug!("{BUS_TAG} created instance '{instance_id}'");
        Self {
            inner: Arc::new(BusInner {
                name: name.to_string(),
                instance_id,
                registry: Arc::new(ChannelRegistry::new(monitor.clone())),
                monitor,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unique id of this bus instance, used as the proxy sender tag.
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    // ---- channel surface ---------------------------------------------------

    /// Looks up or creates the named channel and returns its stream.
    pub fn get_channel(&self, name: &str) -> Result<ChannelStream, BusFault> {
        self.projected_channel(name, None)
    }

    /// Projection carrying only Request-kind messages.
    pub fn get_request_channel(&self, name: &str) -> Result<ChannelStream, BusFault> {
        self.projected_channel(name, Some(MessageKind::Request))
    }

    /// Projection carrying only Response-kind messages.
    pub fn get_response_channel(&self, name: &str) -> Result<ChannelStream, BusFault> {
        self.projected_channel(name, Some(MessageKind::Response))
    }

    /// Projection carrying only Error-kind messages.
    pub fn get_error_channel(&self, name: &str) -> Result<ChannelStream, BusFault> {
        self.projected_channel(name, Some(MessageKind::Error))
    }

    fn projected_channel(
        &self,
        name: &str,
        kind: Option<MessageKind>,
    ) -> Result<ChannelStream, BusFault> {
        let channel = self.inner.registry.get_or_create(name)?;
        Ok(ChannelStream::new(channel, self.inner.registry.clone(), kind))
    }

    /// Releases one explicit reference on the named channel.
    pub fn close_channel(&self, name: &str) {
        self.inner.registry.release_ref(name);
    }

    /// Unconditionally terminates the named channel.
    pub fn destroy_channel(&self, name: &str) -> bool {
        self.inner.registry.destroy(name)
    }

    pub fn destroy_all_channels(&self) {
        self.inner.registry.destroy_all();
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.inner.registry.channel_names()
    }

    // ---- send surface ------------------------------------------------------

    /// Publishes a fully-formed message verbatim.
    pub fn send(&self, channel: &str, message: Message) {
        self.publish(channel, Arc::new(message));
    }

    /// Emits a Request-kind message and returns its correlation id.
    pub fn send_request(
        &self,
        channel: &str,
        payload: Payload,
        id: Option<MessageId>,
        sender: &str,
    ) -> MessageId {
        let id = id.unwrap_or_else(MessageId::generate);
        self.publish(
            channel,
            Arc::new(Message::request(id.clone(), payload, sender)),
        );
        id
    }

    /// Emits a Response-kind message carrying the given correlation id.
    pub fn send_response_with_id(
        &self,
        channel: &str,
        payload: Payload,
        id: MessageId,
        sender: &str,
    ) {
        self.publish(channel, Arc::new(Message::response(id, payload, sender)));
    }

    /// Emits an Error-kind message carrying the given correlation id.
    pub fn send_error_with_id(&self, channel: &str, payload: Payload, id: MessageId, sender: &str) {
        self.publish(channel, Arc::new(Message::error(id, payload, sender)));
    }

    fn publish(&self, channel_name: &str, message: Arc<Message>) {
        let monitor = &self.inner.monitor;

        let Some(channel) = self.inner.registry.find(channel_name) else {
            warn!(
                "{BUS_TAG}{BUS_FN_SEND_TAG} {} channel='{channel_name}' reason={}",
                events::MESSAGE_DROPPED,
                DropReason::NoSuchChannel
            );
            monitor.emit_with(|| MonitorEvent::Dropped {
                channel: channel_name.to_string(),
                reason: DropReason::NoSuchChannel,
            });
            return;
        };

        if channel.is_closed() {
            warn!(
                "{BUS_TAG}{BUS_FN_SEND_TAG} {} channel='{channel_name}'",
                events::SEND_ON_CLOSED_CHANNEL
            );
            monitor.emit_with(|| MonitorEvent::Dropped {
                channel: channel_name.to_string(),
                reason: DropReason::ChannelClosed,
            });
            return;
        }

        // The monitor record precedes the visible effect.
        monitor.emit_with(|| MonitorEvent::MessageData {
            channel: channel_name.to_string(),
            kind: message.kind,
            message: message.clone(),
        });
        if message.is_error() {
            monitor.emit_with(|| MonitorEvent::MessageError {
                channel: channel_name.to_string(),
                message: message.clone(),
            });
        }

        match channel.stream().next(&message) {
            Some(0) => {
                debug!(
                    "{BUS_TAG}{BUS_FN_SEND_TAG} {} channel='{channel_name}'",
                    events::MESSAGE_DROPPED
                );
                monitor.emit_with(|| MonitorEvent::Dropped {
                    channel: channel_name.to_string(),
                    reason: DropReason::NoSubscribers,
                });
            }
            Some(delivered) => {
                debug!(
                    "{BUS_TAG}{BUS_FN_SEND_TAG} {} channel='{channel_name}' kind={} delivered={delivered}",
                    events::MESSAGE_SENT, message.kind
                );
            }
            None => {
                // Completed between the closed check and the emit; possible
                // only through a subscriber destroying its own channel.
                monitor.emit_with(|| MonitorEvent::Dropped {
                    channel: channel_name.to_string(),
                    reason: DropReason::ChannelClosed,
                });
            }
        }
    }

    // ---- listen / request surface ------------------------------------------

    /// Long-lived listener for Response- and Error-kind traffic on a channel.
    pub fn listen(&self, channel: &str, sender: &str) -> MessageHandler {
        debug!("{BUS_TAG}{BUS_FN_LISTEN_TAG} channel='{channel}' sender='{sender}'");
        MessageHandler {
            bus: self.clone(),
            listen_channel: channel.to_string(),
            id_filter: None,
            accept: HandlerAccept::ResponsesAndErrors,
            once: false,
            outbound: None,
            synthetic_failure: None,
        }
    }

    /// Sends a request and resolves at most once on the first Response or
    /// Error carrying `id`, then tears the subscription down.
    ///
    /// The request itself is emitted when [`MessageHandler::handle`] is
    /// invoked, after the reply subscription is armed, so synchronous
    /// responders cannot race the caller.
    pub fn request_once_with_id(
        &self,
        id: MessageId,
        channel: &str,
        payload: Payload,
        return_channel: Option<&str>,
        sender: &str,
    ) -> MessageHandler {
        self.request_handler(id, channel, payload, return_channel, sender, true)
    }

    /// Long-lived variant of [`EventBus::request_once_with_id`]: every
    /// matching Response or Error is delivered, with no auto-teardown.
    pub fn request_stream(
        &self,
        channel: &str,
        payload: Payload,
        id: Option<MessageId>,
        sender: &str,
    ) -> MessageHandler {
        let id = id.unwrap_or_else(MessageId::generate);
        self.request_handler(id, channel, payload, None, sender, false)
    }

    /// Long-lived stream of Request-kind messages on a channel, for
    /// responders. The success handler receives each request; the failure
    /// handler is never invoked.
    pub fn response_stream(&self, channel: &str, sender: &str) -> MessageHandler {
        debug!("{BUS_TAG}{BUS_FN_LISTEN_TAG} respond channel='{channel}' sender='{sender}'");
        MessageHandler {
            bus: self.clone(),
            listen_channel: channel.to_string(),
            id_filter: None,
            accept: HandlerAccept::RequestsOnly,
            once: false,
            outbound: None,
            synthetic_failure: None,
        }
    }

    fn request_handler(
        &self,
        id: MessageId,
        channel: &str,
        payload: Payload,
        return_channel: Option<&str>,
        sender: &str,
        once: bool,
    ) -> MessageHandler {
        let listen_channel = return_channel.unwrap_or(channel).to_string();

        let closed = self
            .inner
            .registry
            .find(channel)
            .map(|existing| existing.is_closed())
            .unwrap_or(false);
        if closed {
            warn!(
                "{BUS_TAG}{BUS_FN_REQUEST_TAG} {} channel='{channel}'",
                events::REQUEST_ON_CLOSED_CHANNEL
            );
            let fault = BusFault::closed_channel_transport(channel);
            self.inner.monitor.emit_with(|| MonitorEvent::FaultRaised {
                detail: fault.to_string(),
            });
            let synthetic = Message::error(
                id,
                serde_json::json!({ "error": fault.to_string() }),
                self.instance_id(),
            );
            return MessageHandler {
                bus: self.clone(),
                listen_channel,
                id_filter: None,
                accept: HandlerAccept::ResponsesAndErrors,
                once,
                outbound: None,
                synthetic_failure: Some(synthetic),
            };
        }

        debug!(
            "{BUS_TAG}{BUS_FN_REQUEST_TAG} channel='{channel}' id='{id}' sender='{sender}' once={once}"
        );
        MessageHandler {
            bus: self.clone(),
            listen_channel,
            id_filter: Some(id.clone()),
            accept: HandlerAccept::ResponsesAndErrors,
            once,
            outbound: Some(OutboundRequest {
                channel: channel.to_string(),
                message: Message::request(id, payload, sender),
            }),
            synthetic_failure: None,
        }
    }

    /// Opens a transaction composer over this bus.
    pub fn create_transaction(
        &self,
        mode: crate::transaction::TransactionMode,
        name: &str,
    ) -> crate::transaction::BusTransaction {
        crate::transaction::BusTransaction::new(self.clone(), mode, name)
    }

    // ---- monitor surface ---------------------------------------------------

    /// Read handle on the monitor meta-stream.
    pub fn monitor(&self) -> MonitorStream {
        MonitorStream::new(self.inner.monitor.stream().clone())
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.inner.monitor.set_enabled(enabled);
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitor.is_enabled()
    }

    /// Reports an invariant violation on the monitor stream, so tests and
    /// tooling can assert against a single sink.
    pub fn raise_fault(&self, fault: &BusFault) {
        error!("{BUS_TAG} fault: {fault}");
        self.inner.monitor.emit_with(|| MonitorEvent::FaultRaised {
            detail: fault.to_string(),
        });
    }
}

#[derive(Clone, Copy)]
enum HandlerAccept {
    ResponsesAndErrors,
    RequestsOnly,
}

struct OutboundRequest {
    channel: String,
    message: Message,
}

/// Armed by `handle`; routes Response-kind messages to the success callback
/// and Error-kind messages to the failure callback.
pub struct MessageHandler {
    bus: EventBus,
    listen_channel: String,
    id_filter: Option<MessageId>,
    accept: HandlerAccept,
    once: bool,
    outbound: Option<OutboundRequest>,
    synthetic_failure: Option<Message>,
}

impl MessageHandler {
    /// The channel this handler listens on.
    pub fn channel(&self) -> &str {
        &self.listen_channel
    }

    /// The correlation id this handler filters on, if any.
    pub fn correlation_id(&self) -> Option<&MessageId> {
        self.id_filter.as_ref()
    }

    /// Arms the handler with a success and a failure callback, then performs
    /// any pending request emission. Returns the subscription; for once-style
    /// handlers the subscription also tears itself down after the first
    /// matching delivery.
    pub fn handle<S, F>(self, success: S, failure: F) -> Subscription
    where
        S: Fn(&Message) + Send + Sync + 'static,
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.handle_parts(Some(Box::new(success)), Some(Box::new(failure)))
    }

    /// Arms the handler with only a success callback. An Error-kind delivery
    /// without a failure callback is logged and dropped; the subscription
    /// stays alive.
    pub fn handle_success<S>(self, success: S) -> Subscription
    where
        S: Fn(&Message) + Send + Sync + 'static,
    {
        self.handle_parts(Some(Box::new(success)), None)
    }

    fn handle_parts(
        self,
        success: Option<Box<dyn Fn(&Message) + Send + Sync>>,
        failure: Option<Box<dyn Fn(&Message) + Send + Sync>>,
    ) -> Subscription {
        if let Some(synthetic) = self.synthetic_failure {
            match failure {
                Some(failure) => failure(&synthetic),
                None => {
                    let fault = BusFault::MissingSubscriberHandler(format!(
                        "synthetic error on '{}' had no failure handler",
                        self.listen_channel
                    ));
                    self.bus.raise_fault(&fault);
                }
            }
            return Subscription::spent();
        }

        let stream = match self.bus.get_channel(&self.listen_channel) {
            Ok(stream) => stream,
            Err(fault) => {
                self.bus.raise_fault(&fault);
                return Subscription::spent();
            }
        };

        let observer = Arc::new(HandlerObserver {
            bus: self.bus.clone(),
            channel: self.listen_channel.clone(),
            id_filter: self.id_filter,
            accept: self.accept,
            once: self.once,
            fired: AtomicBool::new(false),
            success,
            failure,
            own_subscription: Mutex::new(None),
        });

        let base = stream.subscribe(observer.clone());
        if !base.is_active() {
            return base;
        }
        *lock_unpoisoned(&observer.own_subscription) = Some(base);

        // Emit the request only after the reply subscription is armed.
        if let Some(outbound) = self.outbound {
            self.bus.publish(&outbound.channel, Arc::new(outbound.message));
        }

        let slot = observer;
        Subscription::new(move || {
            if let Some(base) = lock_unpoisoned(&slot.own_subscription).take() {
                base.unsubscribe();
            }
        })
    }
}

struct HandlerObserver {
    bus: EventBus,
    channel: String,
    id_filter: Option<MessageId>,
    accept: HandlerAccept,
    once: bool,
    fired: AtomicBool,
    success: Option<Box<dyn Fn(&Message) + Send + Sync>>,
    failure: Option<Box<dyn Fn(&Message) + Send + Sync>>,
    own_subscription: Mutex<Option<Subscription>>,
}

impl HandlerObserver {
    fn teardown(&self) {
        if let Some(subscription) = lock_unpoisoned(&self.own_subscription).take() {
            subscription.unsubscribe();
        }
    }

    fn missing_handler(&self, kind: MessageKind) {
        let fault = BusFault::MissingSubscriberHandler(format!(
            "{kind} message on '{}' had no handler",
            self.channel
        ));
        self.bus.raise_fault(&fault);
    }
}

impl StreamObserver<Arc<Message>> for HandlerObserver {
    fn on_next(&self, message: &Arc<Message>) {
        if let Some(id) = &self.id_filter {
            if &message.id != id {
                return;
            }
        }

        let route = match self.accept {
            HandlerAccept::RequestsOnly => match message.kind {
                MessageKind::Request => Route::Success,
                _ => Route::Ignore,
            },
            HandlerAccept::ResponsesAndErrors => match message.kind {
                MessageKind::Response => Route::Success,
                MessageKind::Error => Route::Failure,
                _ => Route::Ignore,
            },
        };
        if matches!(route, Route::Ignore) {
            return;
        }

        if self.once && self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        match route {
            Route::Success => match &self.success {
                Some(success) => success(message),
                None => self.missing_handler(message.kind),
            },
            Route::Failure => match &self.failure {
                Some(failure) => failure(message),
                None => self.missing_handler(message.kind),
            },
            Route::Ignore => {}
        }

        if self.once {
            self.teardown();
        }
    }
}

#[derive(Clone, Copy)]
enum Route {
    Success,
    Failure,
    Ignore,
}
