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

use frame_bus::streams::{lock_unpoisoned, Subscription};
use frame_bus::{
    EventBus, Payload, TRANSPORT_CODE_MOCK_FAILURE, TRANSPORT_CODE_UNIMPLEMENTED,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const RESPONDER_SENDER: &str = "mock-rest";

/// Scripted responder for transport-channel tests.
///
/// Queued replies are consumed strictly in order: every read pops, regardless
/// of how many replies are queued. Queued errors win over queued responses;
/// an empty script answers with a transport error carrying the
/// "unimplemented" code.
#[derive(Default)]
pub struct MockRestResponder {
    responses: Mutex<VecDeque<Payload>>,
    errors: Mutex<VecDeque<Payload>>,
}

impl MockRestResponder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue_response(&self, payload: Payload) {
        lock_unpoisoned(&self.responses).push_back(payload);
    }

    pub fn enqueue_error(&self, payload: Payload) {
        lock_unpoisoned(&self.errors).push_back(payload);
    }

    /// Pops the next scripted response.
    pub fn force_response(&self) -> Option<Payload> {
        lock_unpoisoned(&self.responses).pop_front()
    }

    /// Pops the next scripted error.
    pub fn force_error(&self) -> Option<Payload> {
        lock_unpoisoned(&self.errors).pop_front()
    }

    /// Subscribes to request traffic on `channel` and answers each request
    /// from the scripted queues, correlated by the request id.
    pub fn attach(self: &Arc<Self>, bus: &EventBus, channel: &str) -> Subscription {
        let responder = self.clone();
        let reply_bus = bus.clone();
        let reply_channel = channel.to_string();
        bus.response_stream(channel, RESPONDER_SENDER)
            .handle_success(move |request| {
                if let Some(error) = responder.force_error() {
                    reply_bus.send_error_with_id(
                        &reply_channel,
                        json!({
                            "code": TRANSPORT_CODE_MOCK_FAILURE,
                            "message": error,
                        }),
                        request.id.clone(),
                        RESPONDER_SENDER,
                    );
                } else if let Some(response) = responder.force_response() {
                    reply_bus.send_response_with_id(
                        &reply_channel,
                        response,
                        request.id.clone(),
                        RESPONDER_SENDER,
                    );
                } else {
                    reply_bus.send_error_with_id(
                        &reply_channel,
                        json!({
                            "code": TRANSPORT_CODE_UNIMPLEMENTED,
                            "message": "no scripted reply",
                        }),
                        request.id.clone(),
                        RESPONDER_SENDER,
                    );
                }
            })
    }
}
