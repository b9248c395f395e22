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

use crate::observability::events;
use crate::streams::lock_unpoisoned;
use log::error;
use std::sync::Mutex;

const ENVELOPE_TAG: &str = "MutateEnvelope:";

/// Caller-side success reply handler of a mutation.
pub type SuccessHandler<V> = Box<dyn FnOnce(V) + Send>;
/// Caller-side error reply handler of a mutation.
pub type ErrorHandler = Box<dyn FnOnce(String) + Send>;

struct EnvelopeReply<V> {
    on_success: Option<SuccessHandler<V>>,
    on_error: Option<ErrorHandler>,
}

/// Single-shot reply handle delivered to mutators.
///
/// Exactly one of `success` or `error` should be invoked, at most once; the
/// reply handlers are consumed on first use and a second reply is logged and
/// dropped.
pub struct MutateEnvelope<V, S> {
    store: String,
    value: V,
    mutation_type: S,
    reply: Mutex<Option<EnvelopeReply<V>>>,
}

impl<V, S> MutateEnvelope<V, S> {
    pub(crate) fn new(
        store: &str,
        value: V,
        mutation_type: S,
        on_success: Option<SuccessHandler<V>>,
        on_error: Option<ErrorHandler>,
    ) -> Self {
        Self {
            store: store.to_string(),
            value,
            mutation_type,
            reply: Mutex::new(Some(EnvelopeReply {
                on_success,
                on_error,
            })),
        }
    }

    /// The value the caller asked to mutate.
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn mutation_type(&self) -> &S {
        &self.mutation_type
    }

    /// Whether a reply has already been consumed.
    pub fn is_replied(&self) -> bool {
        lock_unpoisoned(&self.reply).is_none()
    }

    /// Delivers the mutation result to the caller's success handler.
    pub fn success(&self, result: V) {
        match lock_unpoisoned(&self.reply).take() {
            Some(reply) => match reply.on_success {
                Some(on_success) => on_success(result),
                None => {
                    error!(
                        "{ENVELOPE_TAG} {} store='{}': success reply had no handler",
                        events::STORE_MUTATION_UNHANDLED,
                        self.store
                    );
                }
            },
            None => self.double_reply("success"),
        }
    }

    /// Delivers a mutation failure to the caller's error handler.
    pub fn error(&self, failure: impl Into<String>) {
        let failure = failure.into();
        match lock_unpoisoned(&self.reply).take() {
            Some(reply) => match reply.on_error {
                Some(on_error) => on_error(failure),
                None => {
                    error!(
                        "{ENVELOPE_TAG} {} store='{}': error reply '{failure}' had no handler",
                        events::STORE_MUTATION_UNHANDLED,
                        self.store
                    );
                }
            },
            None => self.double_reply("error"),
        }
    }

    fn double_reply(&self, which: &str) {
        error!(
            "{ENVELOPE_TAG} {} store='{}': {which} called after the envelope was already replied to",
            events::STORE_MUTATION_DOUBLE_REPLY,
            self.store
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn success_consumes_the_reply() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered_in = delivered.clone();
        let envelope: MutateEnvelope<u32, &str> = MutateEnvelope::new(
            "dogs",
            7,
            "update",
            Some(Box::new(move |result| {
                assert_eq!(result, 8);
                delivered_in.fetch_add(1, Ordering::SeqCst);
            })),
            None,
        );

        envelope.success(8);
        envelope.success(9);

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(envelope.is_replied());
    }

    #[test]
    fn error_after_success_is_dropped() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_in = failures.clone();
        let envelope: MutateEnvelope<u32, &str> = MutateEnvelope::new(
            "dogs",
            7,
            "update",
            None,
            Some(Box::new(move |_| {
                failures_in.fetch_add(1, Ordering::SeqCst);
            })),
        );

        envelope.success(8);
        envelope.error("late");

        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }
}
