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

//! # frame-proxy
//!
//! `frame-proxy` extends a [`frame_bus::EventBus`] across frame boundaries.
//! A [`MessageProxy`] relays authorised kernel traffic outward over a
//! [`FrameHost`] (the window abstraction) and re-publishes well-formed
//! inbound frames into the kernel, enforcing origin and channel allowlists
//! and preventing rebroadcast loops.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use frame_bus::EventBus;
//! use frame_proxy::{FrameHost, MessageProxy, ProxyConfig, ProxyType};
//! # use frame_bus::streams::Subscription;
//! # use frame_proxy::{InboundFrameListener, ProxyFrame};
//! #
//! # struct NoopHost;
//! #
//! # impl FrameHost for NoopHost {
//! #     fn current_origin(&self) -> String {
//! #         "https://app.example".to_string()
//! #     }
//! #     fn post_to_parent(&self, _frame: &ProxyFrame, _target_origin: &str) {}
//! #     fn post_to_children(
//! #         &self,
//! #         _frame: &ProxyFrame,
//! #         _target_origin: &str,
//! #         _target_ids: Option<&[String]>,
//! #     ) {
//! #     }
//! #     fn subscribe_inbound(
//! #         &self,
//! #         _listener: Arc<dyn InboundFrameListener>,
//! #     ) -> Subscription {
//! #         Subscription::spent()
//! #     }
//! # }
//!
//! let bus = EventBus::new("app");
//! let host: Arc<dyn FrameHost> = Arc::new(NoopHost);
//!
//! let config = ProxyConfig {
//!     proxy_type: ProxyType::Parent,
//!     accepted_origins: vec!["https://app.example".to_string()],
//!     protected_channels: vec!["chat".to_string()],
//!     target_all_frames: true,
//!     target_specific_frames: Vec::new(),
//!     parent_origin: None,
//! };
//!
//! let proxy = MessageProxy::new(bus, host, config).unwrap();
//! proxy.listen().unwrap();
//! proxy.stop_listening();
//! ```

mod config;
pub use config::{ProxyConfig, ProxyType};

mod control;
pub use control::{ControlPayload, ProxyControlCommand, ProxyInstanceRegistry, ProxyInstanceState};

mod frame_host;
pub use frame_host::{FrameHost, FrameMessageEvent, InboundFrameListener};

mod proxy;
pub use proxy::{MessageProxy, ProxyRunState};

mod wire;
pub use wire::ProxyFrame;
