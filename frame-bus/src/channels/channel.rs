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

use crate::model::Message;
use crate::streams::Subject;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One named logical pipe. The reference count tracks active subscriptions
/// plus explicit create/close calls; the owning registry destroys the channel
/// when it reaches zero.
pub(crate) struct Channel {
    name: String,
    refs: AtomicUsize,
    stream: Subject<Arc<Message>>,
}

impl Channel {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            refs: AtomicUsize::new(0),
            stream: Subject::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn stream(&self) -> &Subject<Arc<Message>> {
        &self.stream
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }

    /// Takes one reference; returns the new count.
    pub(crate) fn acquire(&self) -> usize {
        self.refs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Releases one reference; returns the new count. Saturates at zero.
    pub(crate) fn release(&self) -> usize {
        self.refs
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |refs| {
                refs.checked_sub(1)
            })
            .map(|previous| previous - 1)
            .unwrap_or(0)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.stream.is_completed()
    }
}
