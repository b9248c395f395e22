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

use crate::wire::ProxyFrame;
use frame_bus::streams::Subscription;
use frame_bus::Payload;
use std::sync::Arc;

/// One raw message event received from the frame boundary: the sender's
/// origin plus the posted data, not yet validated.
#[derive(Clone, Debug)]
pub struct FrameMessageEvent {
    pub origin: String,
    pub data: Payload,
}

/// Receiver of inbound frame message events.
pub trait InboundFrameListener: Send + Sync {
    fn on_frame_event(&self, event: &FrameMessageEvent);
}

/// Abstraction over the window tree.
///
/// A browser embedder implements this over `window.parent`, `window.frames`
/// and the message event; non-browser embedders supply an equivalent adapter
/// (e.g. sockets between processes). The proxy owns no frame state of its
/// own and talks to the boundary exclusively through this seam.
pub trait FrameHost: Send + Sync {
    /// Origin of the document this host lives in.
    fn current_origin(&self) -> String;

    /// Posts a frame to the parent window at the given target origin.
    fn post_to_parent(&self, frame: &ProxyFrame, target_origin: &str);

    /// Posts a frame to child windows. `target_ids` narrows delivery to the
    /// named child bus instances; `None` addresses every child.
    fn post_to_children(&self, frame: &ProxyFrame, target_origin: &str, target_ids: Option<&[String]>);

    /// Registers a listener for inbound message events.
    fn subscribe_inbound(&self, listener: Arc<dyn InboundFrameListener>) -> Subscription;
}
