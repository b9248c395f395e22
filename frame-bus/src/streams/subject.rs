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

use log::error;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

const SUBJECT_TAG: &str = "Subject:";

/// Observer of a multicast stream.
///
/// `on_next` runs synchronously inside the publisher's emit call.
/// `on_complete` fires at most once, when the stream terminates.
pub trait StreamObserver<T>: Send + Sync {
    fn on_next(&self, item: &T);

    fn on_complete(&self) {}
}

struct FnObserver<T, F>
where
    F: Fn(&T) + Send + Sync,
{
    next: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> StreamObserver<T> for FnObserver<T, F>
where
    F: Fn(&T) + Send + Sync,
{
    fn on_next(&self, item: &T) {
        (self.next)(item);
    }
}

struct PartsObserver<T, F, G>
where
    F: Fn(&T) + Send + Sync,
    G: Fn() + Send + Sync,
{
    next: F,
    complete: G,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F, G> StreamObserver<T> for PartsObserver<T, F, G>
where
    F: Fn(&T) + Send + Sync,
    G: Fn() + Send + Sync,
{
    fn on_next(&self, item: &T) {
        (self.next)(item);
    }

    fn on_complete(&self) {
        (self.complete)();
    }
}

/// Handle disconnecting one observer from its stream.
///
/// `unsubscribe` is idempotent and is the sole cancellation mechanism;
/// dropping the handle does NOT unsubscribe.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A subscription that was never retained (e.g. the stream had already
    /// completed at subscribe time).
    pub fn spent() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        lock_unpoisoned(&self.cancel).is_some()
    }

    /// Disconnects the observer from future emissions. In-flight synchronous
    /// delivery completes; repeated calls are no-ops.
    pub fn unsubscribe(&self) {
        let cancel = lock_unpoisoned(&self.cancel).take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

struct SubjectState<T> {
    next_key: u64,
    observers: Vec<(u64, Arc<dyn StreamObserver<T>>)>,
    completed: bool,
}

/// Hot, multicast, synchronous stream: every current observer runs before an
/// emit call returns, in subscription order. No replay to late subscribers.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subject<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                next_key: 0,
                observers: Vec::new(),
                completed: false,
            })),
        }
    }

    pub fn observer_count(&self) -> usize {
        lock_unpoisoned(&self.state).observers.len()
    }

    pub fn is_completed(&self) -> bool {
        lock_unpoisoned(&self.state).completed
    }
}

impl<T: 'static> Subject<T> {
    /// Registers an observer. If the stream has already completed, the
    /// observer receives the terminal notification immediately and is not
    /// retained.
    pub fn subscribe(&self, observer: Arc<dyn StreamObserver<T>>) -> Subscription {
        let key = {
            let mut state = lock_unpoisoned(&self.state);
            if state.completed {
                drop(state);
                observer.on_complete();
                return Subscription::spent();
            }
            let key = state.next_key;
            state.next_key += 1;
            state.observers.push((key, observer));
            key
        };

        let weak_state: Weak<Mutex<SubjectState<T>>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak_state.upgrade() {
                let mut state = lock_unpoisoned(&state);
                state.observers.retain(|(observer_key, _)| *observer_key != key);
            }
        })
    }

    /// Closure-only observer, for callers without completion interest.
    pub fn subscribe_next<F>(&self, next: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver {
            next,
            _marker: PhantomData,
        }))
    }

    /// Closure observer with a completion callback.
    pub fn subscribe_parts<F, G>(&self, next: F, complete: G) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(PartsObserver {
            next,
            complete,
            _marker: PhantomData,
        }))
    }

    /// Emits one item to every observer subscribed at emit time, in
    /// subscription order, before returning. Returns the number of observers
    /// the item was offered to, or `None` when the stream already completed
    /// and the item was dropped.
    ///
    /// A panicking observer is isolated: the failure is logged and delivery
    /// continues with the remaining observers.
    pub fn next(&self, item: &T) -> Option<usize> {
        let snapshot: Vec<Arc<dyn StreamObserver<T>>> = {
            let state = lock_unpoisoned(&self.state);
            if state.completed {
                return None;
            }
            state.observers.iter().map(|(_, observer)| observer.clone()).collect()
        };

        for observer in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| observer.on_next(item))).is_err() {
                error!("{SUBJECT_TAG} observer panicked during delivery; continuing with remaining observers");
            }
        }
        Some(snapshot.len())
    }

    /// Terminates the stream: current observers receive the completion
    /// notification once and are released; later emits are dropped.
    pub fn complete(&self) {
        let snapshot: Vec<Arc<dyn StreamObserver<T>>> = {
            let mut state = lock_unpoisoned(&self.state);
            if state.completed {
                return;
            }
            state.completed = true;
            state.observers.drain(..).map(|(_, observer)| observer).collect()
        };

        for observer in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| observer.on_complete())).is_err() {
                error!("{SUBJECT_TAG} observer panicked during completion; continuing with remaining observers");
            }
        }
    }
}

/// Locks a mutex, recovering the inner state when a panicking observer
/// poisoned it. Bus state stays consistent because observers never run while
/// a lock is held.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
