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

use frame_bus::streams::{lock_unpoisoned, StreamObserver, Subject, Subscription};
use frame_bus::Payload;
use frame_proxy::{FrameHost, FrameMessageEvent, InboundFrameListener, ProxyFrame};
use std::sync::{Arc, Mutex};

/// One outbound post captured by the recording host.
#[derive(Clone, Debug)]
pub struct PostedFrame {
    pub frame: ProxyFrame,
    pub target_origin: String,
    /// `None` when the post addressed every child frame.
    pub target_ids: Option<Vec<String>>,
}

struct ListenerBridge {
    listener: Arc<dyn InboundFrameListener>,
}

impl StreamObserver<FrameMessageEvent> for ListenerBridge {
    fn on_next(&self, event: &FrameMessageEvent) {
        self.listener.on_frame_event(event);
    }
}

/// In-memory [`FrameHost`] for tests: records outbound posts and lets the
/// test inject inbound message events.
pub struct RecordingFrameHost {
    origin: String,
    inbound: Subject<FrameMessageEvent>,
    parent_posts: Mutex<Vec<PostedFrame>>,
    child_posts: Mutex<Vec<PostedFrame>>,
}

impl RecordingFrameHost {
    pub fn new(origin: &str) -> Arc<Self> {
        Arc::new(Self {
            origin: origin.to_string(),
            inbound: Subject::new(),
            parent_posts: Mutex::new(Vec::new()),
            child_posts: Mutex::new(Vec::new()),
        })
    }

    /// Injects one raw inbound message event, as the window would.
    pub fn deliver(&self, origin: &str, data: Payload) {
        self.inbound.next(&FrameMessageEvent {
            origin: origin.to_string(),
            data,
        });
    }

    /// Injects a well-formed frame from the given origin.
    pub fn deliver_frame(&self, origin: &str, frame: &ProxyFrame) {
        let data = serde_json::to_value(frame).expect("proxy frames serialize");
        self.deliver(origin, data);
    }

    pub fn parent_posts(&self) -> Vec<PostedFrame> {
        lock_unpoisoned(&self.parent_posts).clone()
    }

    pub fn child_posts(&self) -> Vec<PostedFrame> {
        lock_unpoisoned(&self.child_posts).clone()
    }
}

impl FrameHost for RecordingFrameHost {
    fn current_origin(&self) -> String {
        self.origin.clone()
    }

    fn post_to_parent(&self, frame: &ProxyFrame, target_origin: &str) {
        lock_unpoisoned(&self.parent_posts).push(PostedFrame {
            frame: frame.clone(),
            target_origin: target_origin.to_string(),
            target_ids: None,
        });
    }

    fn post_to_children(
        &self,
        frame: &ProxyFrame,
        target_origin: &str,
        target_ids: Option<&[String]>,
    ) {
        lock_unpoisoned(&self.child_posts).push(PostedFrame {
            frame: frame.clone(),
            target_origin: target_origin.to_string(),
            target_ids: target_ids.map(<[String]>::to_vec),
        });
    }

    fn subscribe_inbound(&self, listener: Arc<dyn InboundFrameListener>) -> Subscription {
        self.inbound.subscribe(Arc::new(ListenerBridge { listener }))
    }
}
