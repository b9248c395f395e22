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

use crate::model::{Message, MessageKind};
use crate::streams::{StreamObserver, Subject, Subscription};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why an emission was dropped instead of delivered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
    NoSuchChannel,
    ChannelClosed,
    NoSubscribers,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoSuchChannel => write!(f, "no_such_channel"),
            DropReason::ChannelClosed => write!(f, "channel_closed"),
            DropReason::NoSubscribers => write!(f, "no_subscribers"),
        }
    }
}

/// One record on the monitor meta-stream.
///
/// Monitor events describe kernel activity for logging, tooling and the
/// proxy. They are emitted before the operation's effect is visible and never
/// themselves generate monitor events.
#[derive(Clone, Debug)]
pub enum MonitorEvent {
    ChannelCreated { channel: String },
    ChannelClosed { channel: String },
    ChannelDestroyed { channel: String },
    SubscriberAdded { channel: String, subscribers: usize },
    SubscriberRemoved { channel: String, subscribers: usize },
    MessageData { channel: String, kind: MessageKind, message: Arc<Message> },
    MessageError { channel: String, message: Arc<Message> },
    Dropped { channel: String, reason: DropReason },
    FaultRaised { detail: String },
}

impl MonitorEvent {
    /// The channel this record concerns, when it concerns one.
    pub fn channel(&self) -> Option<&str> {
        match self {
            MonitorEvent::ChannelCreated { channel }
            | MonitorEvent::ChannelClosed { channel }
            | MonitorEvent::ChannelDestroyed { channel }
            | MonitorEvent::SubscriberAdded { channel, .. }
            | MonitorEvent::SubscriberRemoved { channel, .. }
            | MonitorEvent::MessageData { channel, .. }
            | MonitorEvent::MessageError { channel, .. }
            | MonitorEvent::Dropped { channel, .. } => Some(channel),
            MonitorEvent::FaultRaised { .. } => None,
        }
    }
}

/// Owner of the monitor stream plus the cheap enable toggle.
pub(crate) struct Monitor {
    stream: Subject<MonitorEvent>,
    enabled: AtomicBool,
}

impl Monitor {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            stream: Subject::new(),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Emits a monitor record. The record is only constructed when monitoring
    /// is enabled, so disabled buses pay one atomic load per operation.
    pub(crate) fn emit_with(&self, build: impl FnOnce() -> MonitorEvent) {
        if self.is_enabled() {
            self.stream.next(&build());
        }
    }

    pub(crate) fn stream(&self) -> &Subject<MonitorEvent> {
        &self.stream
    }
}

/// Read-side handle on the monitor stream. Consumers can observe kernel
/// activity but cannot emit into the stream.
#[derive(Clone)]
pub struct MonitorStream {
    subject: Subject<MonitorEvent>,
}

impl MonitorStream {
    pub(crate) fn new(subject: Subject<MonitorEvent>) -> Self {
        Self { subject }
    }

    pub fn subscribe(&self, observer: Arc<dyn StreamObserver<MonitorEvent>>) -> Subscription {
        self.subject.subscribe(observer)
    }

    pub fn subscribe_next<F>(&self, next: F) -> Subscription
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.subject.subscribe_next(next)
    }

    pub fn observer_count(&self) -> usize {
        self.subject.observer_count()
    }
}
