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

use crate::channels::{Channel, ChannelRegistry};
use crate::model::{Message, MessageKind};
use crate::observability::MonitorEvent;
use crate::streams::{StreamObserver, Subscription};
use std::sync::Arc;

struct KindFilterObserver {
    kind: Option<MessageKind>,
    inner: Arc<dyn StreamObserver<Arc<Message>>>,
}

impl StreamObserver<Arc<Message>> for KindFilterObserver {
    fn on_next(&self, message: &Arc<Message>) {
        match self.kind {
            Some(kind) if message.kind != kind => {}
            _ => self.inner.on_next(message),
        }
    }

    fn on_complete(&self) {
        self.inner.on_complete();
    }
}

/// Shared view over one channel, optionally projected to a single message
/// kind. Handles may outlive the channel; subscribing to a destroyed channel
/// delivers the terminal event immediately.
pub struct ChannelStream {
    channel: Arc<Channel>,
    registry: Arc<ChannelRegistry>,
    kind: Option<MessageKind>,
}

impl ChannelStream {
    pub(crate) fn new(
        channel: Arc<Channel>,
        registry: Arc<ChannelRegistry>,
        kind: Option<MessageKind>,
    ) -> Self {
        Self {
            channel,
            registry,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// The projection kind, when this handle is a filtered view.
    pub fn kind(&self) -> Option<MessageKind> {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.channel.stream().observer_count()
    }

    /// Registers an observer on the channel, counted against the channel's
    /// lifetime. Delivery is synchronous and in subscription order.
    pub fn subscribe(&self, observer: Arc<dyn StreamObserver<Arc<Message>>>) -> Subscription {
        let filtered = Arc::new(KindFilterObserver {
            kind: self.kind,
            inner: observer,
        });
        let base = self.channel.stream().subscribe(filtered);
        if !base.is_active() {
            // Channel already completed: the observer got its terminal event
            // and was not retained.
            return base;
        }

        self.channel.acquire();
        let monitor = self.registry.monitor().clone();
        let name = self.channel.name().to_string();
        let subscribers = self.channel.stream().observer_count();
        monitor.emit_with(|| MonitorEvent::SubscriberAdded {
            channel: name.clone(),
            subscribers,
        });

        let registry = self.registry.clone();
        let channel = self.channel.clone();
        let name = self.channel.name().to_string();
        Subscription::new(move || {
            base.unsubscribe();
            let subscribers = channel.stream().observer_count();
            monitor.emit_with(|| MonitorEvent::SubscriberRemoved {
                channel: name.clone(),
                subscribers,
            });
            registry.release_subscriber(&name);
        })
    }

    pub fn subscribe_next<F>(&self, next: F) -> Subscription
    where
        F: Fn(&Arc<Message>) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(ClosureObserver { next }))
    }

    pub fn subscribe_parts<F, G>(&self, next: F, complete: G) -> Subscription
    where
        F: Fn(&Arc<Message>) + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(ClosurePartsObserver { next, complete }))
    }
}

struct ClosureObserver<F>
where
    F: Fn(&Arc<Message>) + Send + Sync,
{
    next: F,
}

impl<F> StreamObserver<Arc<Message>> for ClosureObserver<F>
where
    F: Fn(&Arc<Message>) + Send + Sync,
{
    fn on_next(&self, message: &Arc<Message>) {
        (self.next)(message);
    }
}

struct ClosurePartsObserver<F, G>
where
    F: Fn(&Arc<Message>) + Send + Sync,
    G: Fn() + Send + Sync,
{
    next: F,
    complete: G,
}

impl<F, G> StreamObserver<Arc<Message>> for ClosurePartsObserver<F, G>
where
    F: Fn(&Arc<Message>) + Send + Sync,
    G: Fn() + Send + Sync,
{
    fn on_next(&self, message: &Arc<Message>) {
        (self.next)(message);
    }

    fn on_complete(&self) {
        (self.complete)();
    }
}
