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

use bus_test_support::RecordingFrameHost;
use frame_bus::streams::lock_unpoisoned;
use frame_bus::{EventBus, Message, MessageId, MessageKind};
use frame_proxy::{
    MessageProxy, ProxyConfig, ProxyControlCommand, ProxyFrame, ProxyType,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn child_config() -> ProxyConfig {
    ProxyConfig {
        proxy_type: ProxyType::Child,
        accepted_origins: vec!["https://a.example".to_string()],
        protected_channels: vec!["chat".to_string()],
        target_all_frames: false,
        target_specific_frames: Vec::new(),
        parent_origin: Some("https://parent.example".to_string()),
    }
}

fn parent_config() -> ProxyConfig {
    ProxyConfig {
        proxy_type: ProxyType::Parent,
        accepted_origins: vec!["https://a.example".to_string()],
        protected_channels: vec!["chat".to_string()],
        target_all_frames: false,
        target_specific_frames: Vec::new(),
        parent_origin: None,
    }
}

fn request_frame(channel: &str, payload: serde_json::Value) -> ProxyFrame {
    ProxyFrame {
        channel: channel.to_string(),
        kind: MessageKind::Request,
        payload,
        from: "proxy-some-other-bus".to_string(),
        control: None,
    }
}

#[test]
fn child_registers_on_listen_and_unregisters_on_stop() {
    bus_test_support::init_logging();
    let bus = EventBus::new("child");
    let host = RecordingFrameHost::new("https://child.example");
    let proxy =
        MessageProxy::new(bus, host.clone(), child_config()).expect("proxy should build");

    proxy.listen().expect("listen should succeed");
    proxy.stop_listening();

    let posts = host.parent_posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[0].frame.control.as_deref(),
        Some(ProxyControlCommand::RegisterEventBus.as_str())
    );
    assert_eq!(
        posts[1].frame.control.as_deref(),
        Some(ProxyControlCommand::BusStopListening.as_str())
    );
    assert!(posts
        .iter()
        .all(|post| post.target_origin == "https://parent.example"));
}

#[test]
fn inbound_frames_pass_the_allowlists_or_are_dropped() {
    bus_test_support::init_logging();
    let bus = EventBus::new("child");
    let host = RecordingFrameHost::new("https://child.example");

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_in = received.clone();
    let _chat_sub = bus
        .get_channel("chat")
        .expect("channel should open")
        .subscribe_next(move |message| {
            lock_unpoisoned(&received_in).push(message.clone());
        });

    let proxy = MessageProxy::new(bus.clone(), host.clone(), child_config())
        .expect("proxy should build");
    proxy.listen().expect("listen should succeed");
    let register_posts = host.parent_posts().len();

    // Unlisted origin: dropped before the kernel sees anything.
    host.deliver_frame("https://b.example", &request_frame("chat", json!("hi")));
    assert!(lock_unpoisoned(&received).is_empty());

    // Unlisted channel: dropped even from an accepted origin.
    host.deliver_frame("https://a.example", &request_frame("secrets", json!("psst")));
    assert!(lock_unpoisoned(&received).is_empty());

    // Structurally broken: empty payload.
    host.deliver_frame("https://a.example", &request_frame("chat", json!("")));
    assert!(lock_unpoisoned(&received).is_empty());

    // Accepted origin and channel: exactly one rebroadcast emission.
    host.deliver_frame("https://a.example", &request_frame("chat", json!("hi")));
    {
        let received = lock_unpoisoned(&received);
        assert_eq!(received.len(), 1);
        let message = &received[0];
        assert_eq!(message.kind, MessageKind::Request);
        assert_eq!(message.payload, json!("hi"));
        assert!(message.proxy_rebroadcast);
        assert_eq!(message.sender, "proxy-https://a.example");
    }

    // Loop prevention: the rebroadcast was never relayed back outward.
    assert_eq!(host.parent_posts().len(), register_posts);
}

#[test]
fn own_frames_are_dropped_by_the_sender_tag() {
    bus_test_support::init_logging();
    let bus = EventBus::new("child");
    let host = RecordingFrameHost::new("https://child.example");

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_in = received.clone();
    let _chat_sub = bus
        .get_channel("chat")
        .expect("channel should open")
        .subscribe_next(move |message| {
            lock_unpoisoned(&received_in).push(message.payload.clone());
        });

    let proxy = MessageProxy::new(bus, host.clone(), child_config())
        .expect("proxy should build");
    proxy.listen().expect("listen should succeed");

    let mut own = request_frame("chat", json!("echo"));
    own.from = proxy.from_tag();
    host.deliver_frame("https://a.example", &own);

    assert!(lock_unpoisoned(&received).is_empty());
}

#[test]
fn authorised_local_traffic_is_relayed_to_the_parent() {
    bus_test_support::init_logging();
    let bus = EventBus::new("child");
    let host = RecordingFrameHost::new("https://child.example");
    let proxy = MessageProxy::new(bus.clone(), host.clone(), child_config())
        .expect("proxy should build");
    proxy.listen().expect("listen should succeed");
    let register_posts = host.parent_posts().len();

    // Keep the channels alive so the sends are not dropped.
    let _chat = bus.get_channel("chat").expect("channel should open");
    let _chat_sub = _chat.subscribe_next(|_| {});
    let _secrets = bus.get_channel("secrets").expect("channel should open");
    let _secrets_sub = _secrets.subscribe_next(|_| {});

    let id = bus.send_request("chat", json!("outbound"), None, "app");
    bus.send_request("secrets", json!("keep local"), None, "app");

    let posts = host.parent_posts();
    assert_eq!(posts.len(), register_posts + 1);
    let relayed = &posts[register_posts];
    assert_eq!(relayed.frame.channel, "chat");
    assert_eq!(relayed.frame.kind, MessageKind::Request);
    assert_eq!(relayed.frame.from, proxy.from_tag());
    assert_eq!(relayed.target_origin, "https://parent.example");

    // The full kernel message crossed the boundary, correlation id included.
    let inner: Message =
        serde_json::from_value(relayed.frame.payload.clone()).expect("payload should parse");
    assert_eq!(inner.id, id);
    assert_eq!(inner.payload, json!("outbound"));
}

#[test]
fn parent_targets_registered_children_unless_configured_otherwise() {
    bus_test_support::init_logging();
    let bus = EventBus::new("parent");
    let host = RecordingFrameHost::new("https://parent.example");
    let proxy = MessageProxy::new(bus.clone(), host.clone(), parent_config())
        .expect("proxy should build");
    proxy.listen().expect("listen should succeed");

    // A child announces itself over the control channel.
    host.deliver_frame(
        "https://a.example",
        &ProxyFrame::for_control(
            ProxyControlCommand::RegisterEventBus,
            "child-bus-1",
            ProxyType::Child,
            "proxy-child-bus-1",
        ),
    );
    assert_eq!(proxy.instances().active_ids(), vec!["child-bus-1".to_string()]);

    let _chat = bus.get_channel("chat").expect("channel should open");
    let _chat_sub = _chat.subscribe_next(|_| {});
    bus.send_request("chat", json!("fan out"), None, "app");

    let posts = host.child_posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].target_ids.as_deref(),
        Some(&["child-bus-1".to_string()][..])
    );
    assert_eq!(posts[0].target_origin, "https://a.example");
}

#[test]
fn target_all_frames_addresses_every_child() {
    bus_test_support::init_logging();
    let bus = EventBus::new("parent");
    let host = RecordingFrameHost::new("https://parent.example");
    let mut config = parent_config();
    config.target_all_frames = true;
    let proxy =
        MessageProxy::new(bus.clone(), host.clone(), config).expect("proxy should build");
    proxy.listen().expect("listen should succeed");

    let _chat = bus.get_channel("chat").expect("channel should open");
    let _chat_sub = _chat.subscribe_next(|_| {});
    bus.send_request("chat", json!("broadcast"), None, "app");

    let posts = host.child_posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].target_ids, None);
}

#[test]
fn control_lifecycle_toggles_the_instance_registry() {
    bus_test_support::init_logging();
    let bus = EventBus::new("parent");
    let host = RecordingFrameHost::new("https://parent.example");
    let proxy = MessageProxy::new(bus, host.clone(), parent_config())
        .expect("proxy should build");
    proxy.listen().expect("listen should succeed");

    for (command, expected_active) in [
        (ProxyControlCommand::RegisterEventBus, 1),
        (ProxyControlCommand::BusStopListening, 0),
        (ProxyControlCommand::BusStartListening, 1),
    ] {
        host.deliver_frame(
            "https://a.example",
            &ProxyFrame::for_control(command, "child-bus-1", ProxyType::Child, "proxy-child-bus-1"),
        );
        assert_eq!(proxy.instances().active_ids().len(), expected_active);
    }

    // Unknown commands are ignored without touching the registry.
    host.deliver(
        "https://a.example",
        json!({
            "channel": "__proxycontrol__",
            "type": "Control",
            "payload": { "command": "SelfDestruct", "body": "child-bus-1", "proxyType": "Child" },
            "from": "proxy-child-bus-1",
            "control": "SelfDestruct",
        }),
    );
    assert_eq!(proxy.instances().len(), 1);
    assert_eq!(proxy.instances().active_ids().len(), 1);
}

#[test]
fn correlation_ids_survive_the_frame_boundary() {
    bus_test_support::init_logging();
    let bus = EventBus::new("child");
    let host = RecordingFrameHost::new("https://child.example");
    let proxy = MessageProxy::new(bus.clone(), host.clone(), child_config())
        .expect("proxy should build");
    proxy.listen().expect("listen should succeed");

    let responses = Arc::new(Mutex::new(Vec::new()));
    let responses_in = responses.clone();
    let id = MessageId::from("cross-frame-1");
    let _handler_sub = bus
        .request_once_with_id(id.clone(), "chat", json!("anyone there?"), None, "app")
        .handle(
            move |response| {
                lock_unpoisoned(&responses_in).push(response.payload.clone());
            },
            |error| panic!("unexpected error: {error:?}"),
        );

    // The far side answers with a full serialized message under the same id.
    let reply = Message::response(id, json!("present"), "far-side");
    let frame = ProxyFrame::for_message("chat", &reply, "proxy-far-side-bus")
        .expect("frame should build");
    host.deliver_frame("https://a.example", &frame);

    assert_eq!(*lock_unpoisoned(&responses), vec![json!("present")]);
}
