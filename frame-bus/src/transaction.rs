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

//! Transaction composer: groups correlated requests and completes once every
//! reply has arrived.

use crate::bus::EventBus;
use crate::model::{Message, MessageId, Payload};
use crate::streams::lock_unpoisoned;
use log::{debug, warn};
use std::sync::{Arc, Mutex};

const TRANSACTION_TAG: &str = "BusTransaction:";

/// How queued requests are emitted on commit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionMode {
    /// All requests are emitted immediately; replies may interleave.
    Async,
    /// Each request is emitted only after the previous one has been answered.
    Sync,
}

struct QueuedRequest {
    channel: String,
    payload: Payload,
    sender: String,
    id: MessageId,
}

struct TransactionState {
    responses: Vec<Option<Message>>,
    remaining: usize,
    failed: bool,
    on_complete: Option<Box<dyn FnOnce(Vec<Message>) + Send>>,
    on_error: Option<Box<dyn FnOnce(Message) + Send>>,
}

impl TransactionState {
    fn record(&mut self, index: usize, response: &Message) -> bool {
        if self.failed || self.responses[index].is_some() {
            return false;
        }
        self.responses[index] = Some(response.clone());
        self.remaining -= 1;
        self.remaining == 0
    }
}

fn complete(state: &Arc<Mutex<TransactionState>>) {
    let (on_complete, responses) = {
        let mut state = lock_unpoisoned(state);
        let responses: Vec<Message> = state.responses.iter().flatten().cloned().collect();
        (state.on_complete.take(), responses)
    };
    if let Some(on_complete) = on_complete {
        on_complete(responses);
    }
}

fn fail(state: &Arc<Mutex<TransactionState>>, error: &Message) {
    let on_error = {
        let mut state = lock_unpoisoned(state);
        if state.failed {
            return;
        }
        state.failed = true;
        // A failed transaction never completes.
        state.on_complete = None;
        state.on_error.take()
    };
    match on_error {
        Some(on_error) => on_error(error.clone()),
        None => warn!("{TRANSACTION_TAG} error reply had no handler"),
    }
}

/// A group of requests committed as one unit.
///
/// Requests are queued first; `commit` emits them according to the
/// [`TransactionMode`] and the completion callback receives the replies in
/// request order, independent of arrival order. The first Error-kind reply
/// fails the transaction: the error callback fires once and the completion
/// callback never does.
pub struct BusTransaction {
    bus: EventBus,
    mode: TransactionMode,
    name: String,
    requests: Vec<QueuedRequest>,
    on_complete: Option<Box<dyn FnOnce(Vec<Message>) + Send>>,
    on_error: Option<Box<dyn FnOnce(Message) + Send>>,
}

impl BusTransaction {
    pub(crate) fn new(bus: EventBus, mode: TransactionMode, name: &str) -> Self {
        Self {
            bus,
            mode,
            name: name.to_string(),
            requests: Vec::new(),
            on_complete: None,
            on_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Queues one request; returns its correlation id.
    pub fn send_request(&mut self, channel: &str, payload: Payload, sender: &str) -> MessageId {
        let id = MessageId::generate();
        self.requests.push(QueuedRequest {
            channel: channel.to_string(),
            payload,
            sender: sender.to_string(),
            id: id.clone(),
        });
        id
    }

    /// Registers the completion callback. Replies are delivered in request
    /// order.
    pub fn on_complete(&mut self, callback: impl FnOnce(Vec<Message>) + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Registers the error callback, fired at most once by the first failed
    /// request.
    pub fn on_error(&mut self, callback: impl FnOnce(Message) + Send + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    /// Emits the queued requests. An empty transaction completes immediately.
    pub fn commit(self) {
        debug!(
            "{TRANSACTION_TAG} committing '{}' with {} request(s), mode {:?}",
            self.name,
            self.requests.len(),
            self.mode
        );

        let state = Arc::new(Mutex::new(TransactionState {
            responses: (0..self.requests.len()).map(|_| None).collect(),
            remaining: self.requests.len(),
            failed: false,
            on_complete: self.on_complete,
            on_error: self.on_error,
        }));

        if self.requests.is_empty() {
            complete(&state);
            return;
        }

        let driver = Arc::new(TransactionDriver {
            bus: self.bus,
            requests: self.requests,
            state,
        });
        match self.mode {
            TransactionMode::Async => {
                for index in 0..driver.requests.len() {
                    fire(driver.clone(), index, false);
                }
            }
            TransactionMode::Sync => fire(driver, 0, true),
        }
    }
}

struct TransactionDriver {
    bus: EventBus,
    requests: Vec<QueuedRequest>,
    state: Arc<Mutex<TransactionState>>,
}

fn fire(driver: Arc<TransactionDriver>, index: usize, chain: bool) {
    let request = &driver.requests[index];
    let handler = driver.bus.request_once_with_id(
        request.id.clone(),
        &request.channel,
        request.payload.clone(),
        None,
        &request.sender,
    );

    let success_driver = driver.clone();
    let failure_driver = driver.clone();
    handler.handle(
        move |response| {
            let done = lock_unpoisoned(&success_driver.state).record(index, response);
            if done {
                complete(&success_driver.state);
            } else if chain && index + 1 < success_driver.requests.len() {
                fire(success_driver.clone(), index + 1, true);
            }
        },
        move |error| {
            fail(&failure_driver.state, error);
        },
    );
}
