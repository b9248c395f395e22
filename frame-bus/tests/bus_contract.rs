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

use frame_bus::streams::lock_unpoisoned;
use frame_bus::{DropReason, EventBus, MessageId, MonitorEvent};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn every_subscriber_is_delivered_to_in_subscription_order() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let order = Arc::new(Mutex::new(Vec::new()));

    let channel = bus.get_channel("radio").expect("channel should open");
    for tag in ["first", "second", "third"] {
        let order = order.clone();
        channel.subscribe_next(move |message| {
            lock_unpoisoned(&order).push((tag, message.payload.clone()));
        });
    }

    bus.send_request("radio", json!("tune-in"), None, "contract");

    // Delivery is synchronous: by the time send returns, all three
    // subscribers have run, in subscription order.
    assert_eq!(
        *lock_unpoisoned(&order),
        vec![
            ("first", json!("tune-in")),
            ("second", json!("tune-in")),
            ("third", json!("tune-in")),
        ]
    );
}

#[test]
fn request_once_fires_exactly_once_and_detaches() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let successes = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(AtomicUsize::new(0));

    let responder = bus.clone();
    let _responder_sub = bus
        .response_stream("svc", "svc-worker")
        .handle_success(move |request| {
            responder.send_response_with_id(
                "svc",
                json!({ "echo": request.payload }),
                request.id.clone(),
                "svc-worker",
            );
        });

    let id = MessageId::generate();
    let successes_in = successes.clone();
    let failures_in = failures.clone();
    bus.request_once_with_id(id.clone(), "svc", json!("ping"), None, "caller")
        .handle(
            move |response| {
                lock_unpoisoned(&successes_in).push(response.payload.clone());
            },
            move |_| {
                failures_in.fetch_add(1, Ordering::SeqCst);
            },
        );

    // Late responses under the same id must not reach the detached handler.
    bus.send_response_with_id("svc", json!("straggler"), id.clone(), "svc-worker");
    bus.send_error_with_id("svc", json!("late failure"), id, "svc-worker");

    assert_eq!(
        *lock_unpoisoned(&successes),
        vec![json!({ "echo": "ping" })]
    );
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn error_replies_take_the_failure_path() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let failures = Arc::new(Mutex::new(Vec::new()));

    let responder = bus.clone();
    let _responder_sub = bus
        .response_stream("svc", "svc-worker")
        .handle_success(move |request| {
            responder.send_error_with_id(
                "svc",
                json!("denied"),
                request.id.clone(),
                "svc-worker",
            );
        });

    let failures_in = failures.clone();
    bus.request_once_with_id(MessageId::generate(), "svc", json!("ping"), None, "caller")
        .handle(
            |_| panic!("success must not fire"),
            move |error| {
                lock_unpoisoned(&failures_in).push(error.payload.clone());
            },
        );

    assert_eq!(*lock_unpoisoned(&failures), vec![json!("denied")]);
}

#[test]
fn replies_may_arrive_on_a_dedicated_return_channel() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let successes = Arc::new(AtomicUsize::new(0));

    let responder = bus.clone();
    let _responder_sub = bus
        .response_stream("svc", "svc-worker")
        .handle_success(move |request| {
            responder.send_response_with_id(
                "svc-return",
                json!("over here"),
                request.id.clone(),
                "svc-worker",
            );
        });

    let successes_in = successes.clone();
    bus.request_once_with_id(
        MessageId::generate(),
        "svc",
        json!("ping"),
        Some("svc-return"),
        "caller",
    )
    .handle(
        move |_| {
            successes_in.fetch_add(1, Ordering::SeqCst);
        },
        |error| panic!("unexpected error: {error:?}"),
    );

    assert_eq!(successes.load(Ordering::SeqCst), 1);
}

#[test]
fn listen_routes_responses_and_errors_to_their_handlers() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let successes = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(Vec::new()));

    let successes_in = successes.clone();
    let failures_in = failures.clone();
    let _listener_sub = bus.listen("svc", "observer").handle(
        move |response| {
            lock_unpoisoned(&successes_in).push(response.payload.clone());
        },
        move |error| {
            lock_unpoisoned(&failures_in).push(error.payload.clone());
        },
    );

    // A long-lived listener sees every reply on the channel, regardless of id.
    bus.send_response_with_id("svc", json!("first"), MessageId::generate(), "svc-worker");
    bus.send_response_with_id("svc", json!("second"), MessageId::generate(), "svc-worker");
    bus.send_error_with_id("svc", json!("broken"), MessageId::generate(), "svc-worker");
    bus.send_request("svc", json!("not a reply"), None, "caller");

    assert_eq!(
        *lock_unpoisoned(&successes),
        vec![json!("first"), json!("second")]
    );
    assert_eq!(*lock_unpoisoned(&failures), vec![json!("broken")]);
}

#[test]
fn request_stream_keeps_delivering_matching_replies() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let successes = Arc::new(Mutex::new(Vec::new()));

    let handler = bus.request_stream("svc", json!("subscribe"), None, "caller");
    let id = handler
        .correlation_id()
        .expect("request streams correlate by id")
        .clone();

    let successes_in = successes.clone();
    let subscription = handler.handle(
        move |response| {
            lock_unpoisoned(&successes_in).push(response.payload.clone());
        },
        |error| panic!("unexpected error: {error:?}"),
    );

    for n in 0..3 {
        bus.send_response_with_id("svc", json!(n), id.clone(), "svc-worker");
    }
    bus.send_response_with_id("svc", json!("other"), MessageId::generate(), "svc-worker");

    assert_eq!(
        *lock_unpoisoned(&successes),
        vec![json!(0), json!(1), json!(2)]
    );

    subscription.unsubscribe();
    bus.send_response_with_id("svc", json!("late"), id, "svc-worker");
    assert_eq!(lock_unpoisoned(&successes).len(), 3);
}

#[test]
fn monitor_records_precede_visible_effects_and_do_not_recurse() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let sequence = Arc::new(Mutex::new(Vec::new()));

    let sequence_monitor = sequence.clone();
    let monitor_deliveries = Arc::new(AtomicUsize::new(0));
    let monitor_deliveries_in = monitor_deliveries.clone();
    let _monitor_sub = bus.monitor().subscribe_next(move |event| {
        monitor_deliveries_in.fetch_add(1, Ordering::SeqCst);
        if let MonitorEvent::MessageData { channel, .. } = event {
            lock_unpoisoned(&sequence_monitor).push(format!("monitor:{channel}"));
        }
    });

    let sequence_delivery = sequence.clone();
    bus.get_channel("radio")
        .expect("channel should open")
        .subscribe_next(move |_| {
            lock_unpoisoned(&sequence_delivery).push("delivery".to_string());
        });

    bus.send_request("radio", json!("tune-in"), None, "contract");

    assert_eq!(
        *lock_unpoisoned(&sequence),
        vec!["monitor:radio".to_string(), "delivery".to_string()]
    );
    // The monitor observer itself produced no further monitor records beyond
    // the operations above: channel create, subscriber add, message data.
    assert_eq!(monitor_deliveries.load(Ordering::SeqCst), 3);
}

#[test]
fn sending_into_the_void_is_reported_as_dropped() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let drops = Arc::new(Mutex::new(Vec::new()));

    let drops_in = drops.clone();
    let _monitor_sub = bus.monitor().subscribe_next(move |event| {
        if let MonitorEvent::Dropped { channel, reason } = event {
            lock_unpoisoned(&drops_in).push((channel.clone(), *reason));
        }
    });

    bus.send_request("nowhere", json!("lost"), None, "contract");

    let _keep = bus.get_channel("doomed").expect("channel should open");
    bus.destroy_channel("doomed");
    bus.send_request("doomed", json!("also lost"), None, "contract");

    assert_eq!(
        *lock_unpoisoned(&drops),
        vec![
            ("nowhere".to_string(), DropReason::NoSuchChannel),
            ("doomed".to_string(), DropReason::ChannelClosed),
        ]
    );
}

#[test]
fn destroying_all_channels_completes_observers() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let completions = Arc::new(AtomicUsize::new(0));

    for name in ["left", "right"] {
        let completions = completions.clone();
        bus.get_channel(name)
            .expect("channel should open")
            .subscribe_parts(|_| {}, move || {
                completions.fetch_add(1, Ordering::SeqCst);
            });
    }

    bus.destroy_all_channels();

    assert_eq!(completions.load(Ordering::SeqCst), 2);
    assert!(bus.channel_names().is_empty());
}

#[test]
fn monitoring_toggle_silences_the_meta_stream() {
    bus_test_support::init_logging();
    let bus = EventBus::new("contract");
    let events_seen = Arc::new(AtomicUsize::new(0));

    let events_in = events_seen.clone();
    let _monitor_sub = bus.monitor().subscribe_next(move |_| {
        events_in.fetch_add(1, Ordering::SeqCst);
    });

    bus.set_monitoring(false);
    bus.get_channel("quiet").expect("channel should open");
    bus.send_request("quiet", json!("nothing to see"), None, "contract");
    assert_eq!(events_seen.load(Ordering::SeqCst), 0);

    bus.set_monitoring(true);
    bus.get_channel("loud").expect("channel should open");
    assert!(events_seen.load(Ordering::SeqCst) > 0);
}
