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

//! # frame-bus
//!
//! `frame-bus` is a client-side publish/subscribe message bus used to
//! decouple the components of a large application, and the in-process half of
//! extending that bus across frame boundaries (see the `frame-proxy` crate).
//!
//! The API centers on [`EventBus`]: channels are created lazily, fan-out is
//! multicast and synchronous, and request/response pairs correlate by
//! [`MessageId`]. A monitor meta-stream describes all kernel activity for
//! logging, tooling and the proxy.
//!
//! ## Quick start
//!
//! ```
//! use frame_bus::EventBus;
//! use serde_json::json;
//!
//! let bus = EventBus::new("quick-start");
//!
//! let chat = bus.get_channel("chat").unwrap();
//! let subscription = chat.subscribe_next(|message| {
//!     assert_eq!(message.payload, json!("hello"));
//! });
//!
//! bus.send_request("chat", json!("hello"), None, "quick-start");
//! subscription.unsubscribe();
//! ```
//!
//! ## Request/response contract
//!
//! Once-style handlers arm their reply subscription before the request is
//! emitted, so a responder that replies synchronously cannot race the caller;
//! the handler fires exactly once and tears itself down.
//!
//! ```
//! use frame_bus::{EventBus, MessageId};
//! use serde_json::json;
//!
//! let bus = EventBus::new("echo");
//!
//! let responder = bus.clone();
//! let _responder_sub = bus.response_stream("svc", "echo-svc").handle_success(move |request| {
//!     responder.send_response_with_id("svc", request.payload.clone(), request.id.clone(), "echo-svc");
//! });
//!
//! let handler = bus.request_once_with_id(MessageId::generate(), "svc", json!("ping"), None, "caller");
//! handler.handle(
//!     |response| assert_eq!(response.payload, json!("ping")),
//!     |error| panic!("unexpected error: {error:?}"),
//! );
//! ```
//!
//! ## Internal architecture map
//!
//! - Message model: value types for ids, kinds and the message tuple
//! - Channels: registry ownership, reference counts, kind projections
//! - Streams: the in-house hot multicast primitive
//! - Kernel facade: send/listen/request operations, correlation and the
//!   transaction composer
//! - Observability: the monitor meta-stream and canonical event names
//! - Stores: keyed values, change streams, mutation protocol, ready join
//! - Fabric: connection/org/version facade over well-known channels
//!
//! ## Concurrency model
//!
//! Single logical executor. Emission is synchronous and in subscription
//! order; the kernel spawns no threads, holds no lock while observers run,
//! and never blocks. Types are `Send + Sync` so an embedder may drive the bus
//! from the thread of its choosing, but correctness never relies on
//! parallelism.
//!
//! ## Observability model
//!
//! Library code logs through the `log` facade and emits monitor records on
//! the [`MonitorStream`]. No global logger is initialized here; binaries and
//! tests own one-time logger setup at process boundaries.

mod bus;
pub use bus::{BusConfig, EventBus, MessageHandler};

mod channels;
pub use channels::ChannelStream;

mod fault;
pub use fault::{
    BusFault, TRANSPORT_CODE_INVALID_SERVICE_REQUEST, TRANSPORT_CODE_MOCK_FAILURE,
    TRANSPORT_CODE_UNIMPLEMENTED,
};

mod model;
pub use model::{Message, MessageId, MessageKind, Payload, PROTOCOL_VERSION};

pub mod fabric;
pub mod observability;
pub use observability::{DropReason, MonitorEvent, MonitorStream};

pub mod store;
pub use store::{BusStore, StoreManager};

pub mod streams;
pub use streams::{StreamObserver, Subject, Subscription};

mod tick;
pub use tick::TickQueue;

mod transaction;
pub use transaction::{BusTransaction, TransactionMode};
