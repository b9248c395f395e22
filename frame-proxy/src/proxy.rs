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

use crate::config::{ProxyConfig, ProxyType};
use crate::control::{ControlPayload, ProxyControlCommand, ProxyInstanceRegistry};
use crate::frame_host::{FrameHost, FrameMessageEvent, InboundFrameListener};
use crate::wire::ProxyFrame;
use frame_bus::fabric::PROXY_CONTROL_CHANNEL;
use frame_bus::observability::events;
use frame_bus::streams::{lock_unpoisoned, StreamObserver, Subscription};
use frame_bus::{
    BusFault, EventBus, Message, MessageId, MessageKind, MonitorEvent, PROTOCOL_VERSION,
};
use log::{debug, error, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

const PROXY_TAG: &str = "MessageProxy:";
/// Sender-label prefix; rebroadcast messages carry `proxy-<origin>` and
/// outbound frames carry `proxy-<busId>`.
const PROXY_NAME: &str = "proxy";

/// Listening state of one proxy side.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProxyRunState {
    Idle,
    ListeningParent,
    ListeningChild,
}

/// Cross-frame relay: subscribes to the kernel monitor stream to decide what
/// to post outward, and re-publishes validated inbound frames into the
/// kernel. Owns no bus state beyond the instance registry.
pub struct MessageProxy {
    bus: EventBus,
    host: Arc<dyn FrameHost>,
    config: ProxyConfig,
    authorised: HashSet<String>,
    instances: ProxyInstanceRegistry,
    run_state: Mutex<ProxyRunState>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl MessageProxy {
    /// Builds a proxy over a validated configuration. An unusable
    /// configuration is logged, surfaced on the monitor stream and refused.
    pub fn new(
        bus: EventBus,
        host: Arc<dyn FrameHost>,
        config: ProxyConfig,
    ) -> Result<Arc<Self>, BusFault> {
        if let Err(fault) = config.validate() {
            error!("{PROXY_TAG} refusing to operate: {fault}");
            bus.raise_fault(&fault);
            return Err(fault);
        }

        let mut authorised: HashSet<String> = config.protected_channels.iter().cloned().collect();
        authorised.insert(PROXY_CONTROL_CHANNEL.to_string());

        Ok(Arc::new(Self {
            bus,
            host,
            config,
            authorised,
            instances: ProxyInstanceRegistry::new(),
            run_state: Mutex::new(ProxyRunState::Idle),
            subscriptions: Mutex::new(Vec::new()),
        }))
    }

    pub fn run_state(&self) -> ProxyRunState {
        *lock_unpoisoned(&self.run_state)
    }

    /// Registry of bus instances learned through control traffic.
    pub fn instances(&self) -> &ProxyInstanceRegistry {
        &self.instances
    }

    /// The sender tag this proxy stamps on outbound frames.
    pub fn from_tag(&self) -> String {
        format!("{PROXY_NAME}-{}", self.bus.instance_id())
    }

    /// Starts relaying. A child proxy announces itself to its parent with
    /// RegisterEventBus.
    pub fn listen(self: &Arc<Self>) -> Result<(), BusFault> {
        {
            let mut state = lock_unpoisoned(&self.run_state);
            if *state != ProxyRunState::Idle {
                return Ok(());
            }
            *state = match self.config.proxy_type {
                ProxyType::Parent => ProxyRunState::ListeningParent,
                ProxyType::Child => ProxyRunState::ListeningChild,
                // Rejected at construction.
                ProxyType::Hybrid => {
                    return Err(BusFault::InvalidConfiguration(
                        "the hybrid proxy role is reserved and not implemented".to_string(),
                    ))
                }
            };
        }

        let inbound = self.host.subscribe_inbound(Arc::new(InboundRelay {
            proxy: Arc::downgrade(self),
        }));
        let outbound = self.bus.monitor().subscribe(Arc::new(OutboundRelay {
            proxy: Arc::downgrade(self),
        }));
        {
            let mut subscriptions = lock_unpoisoned(&self.subscriptions);
            subscriptions.push(inbound);
            subscriptions.push(outbound);
        }

        if self.run_state() == ProxyRunState::ListeningChild {
            self.post_control_to_parent(ProxyControlCommand::RegisterEventBus);
        }
        debug!("{PROXY_TAG} listening as {:?}", self.run_state());
        Ok(())
    }

    /// Stops relaying. A child proxy announces BusStopListening first.
    pub fn stop_listening(&self) {
        let was_child = {
            let mut state = lock_unpoisoned(&self.run_state);
            if *state == ProxyRunState::Idle {
                return;
            }
            let was_child = *state == ProxyRunState::ListeningChild;
            *state = ProxyRunState::Idle;
            was_child
        };

        if was_child {
            self.post_control_to_parent(ProxyControlCommand::BusStopListening);
        }

        let drained: Vec<Subscription> = {
            let mut subscriptions = lock_unpoisoned(&self.subscriptions);
            subscriptions.drain(..).collect()
        };
        for subscription in drained {
            subscription.unsubscribe();
        }
        debug!("{PROXY_TAG} stopped listening");
    }

    fn post_control_to_parent(&self, command: ProxyControlCommand) {
        let frame = ProxyFrame::for_control(
            command,
            self.bus.instance_id(),
            self.config.proxy_type,
            &self.from_tag(),
        );
        let target_origin = self.config.parent_origin.as_deref().unwrap_or("*");
        self.host.post_to_parent(&frame, target_origin);
    }

    fn channel_authorised(&self, channel: &str) -> bool {
        self.authorised.contains(channel)
    }

    // ---- inbound pipeline --------------------------------------------------

    /// Validates one raw frame event and, when it survives the filter
    /// pipeline, re-publishes it into the kernel marked as a rebroadcast.
    pub fn handle_frame_event(&self, event: &FrameMessageEvent) {
        if self.run_state() == ProxyRunState::Idle {
            return;
        }

        // Loop prevention: our own frames come back tagged with our bus id.
        let own_tag = self.from_tag();
        if event
            .data
            .get("from")
            .and_then(|from| from.as_str())
            .map(|from| from == own_tag)
            .unwrap_or(false)
        {
            debug!("{PROXY_TAG} {}", events::PROXY_FRAME_DROPPED_OWN);
            return;
        }

        if !self.config.origin_allowed(&event.origin) {
            warn!(
                "{PROXY_TAG} {} {}",
                events::PROXY_FRAME_DROPPED_ORIGIN,
                BusFault::UnauthorizedOrigin(event.origin.clone())
            );
            return;
        }

        let frame: ProxyFrame = match serde_json::from_value(event.data.clone()) {
            Ok(frame) => frame,
            Err(parse_error) => {
                warn!(
                    "{PROXY_TAG} {} {}",
                    events::PROXY_FRAME_DROPPED_MALFORMED,
                    BusFault::MalformedProxyMessage(parse_error.to_string())
                );
                return;
            }
        };
        if frame.channel.is_empty() || !frame.has_payload() {
            warn!(
                "{PROXY_TAG} {} {}",
                events::PROXY_FRAME_DROPPED_MALFORMED,
                BusFault::MalformedProxyMessage(
                    "frames require a non-empty channel and payload".to_string()
                )
            );
            return;
        }

        if !self.channel_authorised(&frame.channel) {
            warn!(
                "{PROXY_TAG} {} {}",
                events::PROXY_FRAME_DROPPED_CHANNEL,
                BusFault::UnauthorizedChannel(frame.channel.clone())
            );
            return;
        }

        if frame.channel == PROXY_CONTROL_CHANNEL {
            if frame.kind == MessageKind::Control {
                self.apply_control(&frame);
            } else {
                warn!(
                    "{PROXY_TAG} {} non-control traffic on '{PROXY_CONTROL_CHANNEL}'",
                    events::PROXY_FRAME_DROPPED_MALFORMED
                );
            }
            return;
        }

        let sender = format!("{PROXY_NAME}-{}", event.origin);
        let message = match serde_json::from_value::<Message>(frame.payload.clone()) {
            // Relayed kernel traffic: keep the original correlation id.
            Ok(inner) if inner.kind == frame.kind => inner.rebroadcast_copy(&sender),
            // Bare payload from a foreign sender: enters under a fresh id.
            _ => Message {
                id: MessageId::generate(),
                kind: frame.kind,
                payload: frame.payload.clone(),
                sender,
                version: PROTOCOL_VERSION,
                proxy_rebroadcast: true,
            },
        };
        self.bus.send(&frame.channel, message);
    }

    fn apply_control(&self, frame: &ProxyFrame) {
        let payload: ControlPayload = match serde_json::from_value(frame.payload.clone()) {
            Ok(payload) => payload,
            Err(parse_error) => {
                warn!(
                    "{PROXY_TAG} {} {}",
                    events::PROXY_FRAME_DROPPED_MALFORMED,
                    BusFault::MalformedProxyMessage(format!(
                        "control payload failed to parse: {parse_error}"
                    ))
                );
                return;
            }
        };

        match ProxyControlCommand::parse(&payload.command) {
            Some(command) => self.instances.apply(command, &payload.body, payload.proxy_type),
            None => {
                warn!(
                    "{PROXY_TAG} {} {}",
                    events::PROXY_CONTROL_UNKNOWN,
                    BusFault::UnknownControl(payload.command.clone())
                );
            }
        }
    }

    // ---- outbound relay ----------------------------------------------------

    fn relay_monitor_event(&self, event: &MonitorEvent) {
        let state = self.run_state();
        if state == ProxyRunState::Idle {
            return;
        }

        let MonitorEvent::MessageData {
            channel, message, ..
        } = event
        else {
            return;
        };
        if !self.channel_authorised(channel) {
            return;
        }
        if message.proxy_rebroadcast {
            debug!(
                "{PROXY_TAG} {} channel='{channel}'",
                events::PROXY_REBROADCAST_SUPPRESSED
            );
            return;
        }

        let frame = match ProxyFrame::for_message(channel, message, &self.from_tag()) {
            Ok(frame) => frame,
            Err(fault) => {
                warn!("{PROXY_TAG} outbound relay failed: {fault}");
                return;
            }
        };

        match state {
            ProxyRunState::ListeningParent => {
                let target_ids = if self.config.target_all_frames {
                    None
                } else if !self.config.target_specific_frames.is_empty() {
                    Some(self.config.target_specific_frames.clone())
                } else {
                    Some(self.instances.active_ids())
                };
                self.host.post_to_children(
                    &frame,
                    self.config.child_target_origin(),
                    target_ids.as_deref(),
                );
            }
            ProxyRunState::ListeningChild => {
                let target_origin = self.config.parent_origin.as_deref().unwrap_or("*");
                self.host.post_to_parent(&frame, target_origin);
            }
            ProxyRunState::Idle => {}
        }
        debug!(
            "{PROXY_TAG} {} channel='{channel}'",
            events::PROXY_RELAY_OUT
        );
    }
}

struct InboundRelay {
    proxy: Weak<MessageProxy>,
}

impl InboundFrameListener for InboundRelay {
    fn on_frame_event(&self, event: &FrameMessageEvent) {
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.handle_frame_event(event);
        }
    }
}

struct OutboundRelay {
    proxy: Weak<MessageProxy>,
}

impl StreamObserver<MonitorEvent> for OutboundRelay {
    fn on_next(&self, event: &MonitorEvent) {
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.relay_monitor_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHost;

    impl FrameHost for NoopHost {
        fn current_origin(&self) -> String {
            "https://app.example".to_string()
        }

        fn post_to_parent(&self, _frame: &ProxyFrame, _target_origin: &str) {}

        fn post_to_children(
            &self,
            _frame: &ProxyFrame,
            _target_origin: &str,
            _target_ids: Option<&[String]>,
        ) {
        }

        fn subscribe_inbound(&self, _listener: Arc<dyn InboundFrameListener>) -> Subscription {
            Subscription::spent()
        }
    }

    fn parent_config() -> ProxyConfig {
        ProxyConfig {
            proxy_type: ProxyType::Parent,
            accepted_origins: vec!["https://a.example".to_string()],
            protected_channels: vec!["chat".to_string()],
            target_all_frames: true,
            target_specific_frames: Vec::new(),
            parent_origin: None,
        }
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let bus = EventBus::new("proxy-test");
        let mut config = parent_config();
        config.accepted_origins.clear();

        let result = MessageProxy::new(bus, Arc::new(NoopHost), config);

        assert!(matches!(result, Err(BusFault::InvalidConfiguration(_))));
    }

    #[test]
    fn listen_and_stop_walk_the_state_machine() {
        let bus = EventBus::new("proxy-test");
        let proxy = MessageProxy::new(bus, Arc::new(NoopHost), parent_config())
            .expect("proxy should build");

        assert_eq!(proxy.run_state(), ProxyRunState::Idle);
        proxy.listen().expect("listen should succeed");
        assert_eq!(proxy.run_state(), ProxyRunState::ListeningParent);
        proxy.listen().expect("second listen is a no-op");
        proxy.stop_listening();
        assert_eq!(proxy.run_state(), ProxyRunState::Idle);
        proxy.stop_listening();
    }

    #[test]
    fn idle_proxy_ignores_frame_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let bus = EventBus::new("proxy-test");
        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered_in = delivered.clone();
        let _sub = bus
            .get_channel("chat")
            .expect("channel should open")
            .subscribe_next(move |_| {
                delivered_in.fetch_add(1, Ordering::SeqCst);
            });
        let proxy = MessageProxy::new(bus.clone(), Arc::new(NoopHost), parent_config())
            .expect("proxy should build");

        proxy.handle_frame_event(&FrameMessageEvent {
            origin: "https://a.example".to_string(),
            data: serde_json::json!({
                "channel": "chat",
                "type": "Request",
                "payload": "hi",
                "from": "elsewhere",
                "control": null,
            }),
        });

        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
