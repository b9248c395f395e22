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
use crate::store::mutate::{ErrorHandler, MutateEnvelope, SuccessHandler};
use crate::streams::{lock_unpoisoned, Subject, Subscription};
use log::{debug, warn};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const STORE_TAG: &str = "BusStore:";

/// One state-tagged change notification.
///
/// For removals the value is the pre-removal value; the key is already gone
/// from the store by the time observers run.
#[derive(Clone, Debug)]
pub struct StoreChange<K, V, S> {
    pub key: K,
    pub value: V,
    pub state: S,
    pub removed: bool,
}

struct StoreValues<K, V> {
    order: Vec<K>,
    map: HashMap<K, V>,
}

struct ReadyState {
    ready: bool,
    /// `populate` succeeds while armed; `initialize` and `populate` disarm,
    /// `reset` re-arms.
    load_armed: bool,
    waiters: Vec<Box<dyn FnOnce() + Send>>,
}

/// Keyed in-memory store with insertion-ordered iteration, state-tagged
/// change streams and a single-shot mutation protocol.
///
/// State tags and mutation types share the `S` parameter; callers bring one
/// tag type per store.
pub struct BusStore<K, V, S> {
    name: String,
    values: Mutex<StoreValues<K, V>>,
    ready: Mutex<ReadyState>,
    changes: Subject<StoreChange<K, V, S>>,
    mutations: Subject<Arc<MutateEnvelope<V, S>>>,
    closed: AtomicBool,
}

impl<K, V, S> BusStore<K, V, S>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: Mutex::new(StoreValues {
                order: Vec::new(),
                map: HashMap::new(),
            }),
            ready: Mutex::new(ReadyState {
                ready: false,
                load_armed: true,
                waiters: Vec::new(),
            }),
            changes: Subject::new(),
            mutations: Subject::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ---- keyed values ------------------------------------------------------

    /// Upserts a value and emits exactly one change event. First insertion
    /// position is preserved across later puts of the same key.
    pub fn put(&self, key: K, value: V, state: S) {
        if self.closed.load(Ordering::Relaxed) {
            warn!("{STORE_TAG} put on closed store '{}'", self.name);
            return;
        }

        {
            let mut values = lock_unpoisoned(&self.values);
            if !values.map.contains_key(&key) {
                values.order.push(key.clone());
            }
            values.map.insert(key.clone(), value.clone());
        }

        self.changes.next(&StoreChange {
            key,
            value,
            state,
            removed: false,
        });
    }

    /// Removes a key. The deletion happens before observers see the change
    /// event, which carries the removed value. Returns false when the key was
    /// absent, in which case nothing is emitted.
    pub fn remove(&self, key: &K, state: S) -> bool {
        if self.closed.load(Ordering::Relaxed) {
            warn!("{STORE_TAG} remove on closed store '{}'", self.name);
            return false;
        }

        let removed_value = {
            let mut values = lock_unpoisoned(&self.values);
            match values.map.remove(key) {
                Some(value) => {
                    values.order.retain(|existing| existing != key);
                    value
                }
                None => return false,
            }
        };

        self.changes.next(&StoreChange {
            key: key.clone(),
            value: removed_value,
            state,
            removed: true,
        });
        true
    }

    pub fn get(&self, key: &K) -> Option<V> {
        lock_unpoisoned(&self.values).map.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.values).map.len()
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.values).map.is_empty()
    }

    /// Snapshot of all values in insertion order.
    pub fn all_values(&self) -> Vec<V> {
        let values = lock_unpoisoned(&self.values);
        values
            .order
            .iter()
            .filter_map(|key| values.map.get(key).cloned())
            .collect()
    }

    /// Defensive copy: mutating the returned map does not affect the store.
    pub fn all_values_as_map(&self) -> HashMap<K, V> {
        lock_unpoisoned(&self.values).map.clone()
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Bulk load. Returns true only when the store has neither been populated
    /// nor initialized since construction (or since the last `reset`);
    /// rejected populates mutate nothing. A successful populate marks the
    /// store ready.
    pub fn populate(&self, entries: Vec<(K, V)>) -> bool {
        {
            let mut ready = lock_unpoisoned(&self.ready);
            if !ready.load_armed {
                debug!(
                    "{STORE_TAG} {} store='{}'",
                    events::STORE_POPULATE_REJECTED,
                    self.name
                );
                return false;
            }
            ready.load_armed = false;
        }

        {
            let mut values = lock_unpoisoned(&self.values);
            for (key, value) in entries {
                if !values.map.contains_key(&key) {
                    values.order.push(key.clone());
                }
                values.map.insert(key, value);
            }
        }

        self.mark_ready();
        true
    }

    /// Marks the store ready, exactly once, and notifies `when_ready` waiters
    /// in registration order.
    pub fn initialize(&self) {
        {
            let mut ready = lock_unpoisoned(&self.ready);
            ready.load_armed = false;
        }
        self.mark_ready();
    }

    fn mark_ready(&self) {
        let waiters = {
            let mut ready = lock_unpoisoned(&self.ready);
            if ready.ready {
                return;
            }
            ready.ready = true;
            std::mem::take(&mut ready.waiters)
        };
        for waiter in waiters {
            waiter();
        }
    }

    pub fn is_ready(&self) -> bool {
        lock_unpoisoned(&self.ready).ready
    }

    /// Runs `waiter` once the store becomes ready; synchronously when it
    /// already is.
    pub fn when_ready(&self, waiter: impl FnOnce() + Send + 'static) {
        let run_now = {
            let mut ready = lock_unpoisoned(&self.ready);
            if ready.ready {
                true
            } else {
                ready.waiters.push(Box::new(waiter));
                return;
            }
        };
        if run_now {
            waiter();
        }
    }

    /// Clears values without change events. Readiness and subscribers are
    /// retained; `populate` is re-armed.
    pub fn reset(&self) {
        {
            let mut values = lock_unpoisoned(&self.values);
            values.order.clear();
            values.map.clear();
        }
        lock_unpoisoned(&self.ready).load_armed = true;
    }

    /// Completes the change and mutation streams. Later puts and removes are
    /// warned about and ignored.
    pub fn close_store(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.changes.complete();
        self.mutations.complete();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    // ---- change streams ----------------------------------------------------

    /// Changes for one key, filtered to the given states. An empty state list
    /// means all states.
    pub fn on_change(&self, key: K, states: &[S]) -> StoreStream<K, V, S> {
        StoreStream {
            store: self.name.clone(),
            changes: self.changes.clone(),
            key: Some(key),
            states: states.to_vec(),
            discriminator: None,
        }
    }

    /// Changes across all keys whose value passes `discriminator` (the
    /// variant selector), filtered to the given states. The two filters are
    /// independent and both must pass; an empty state list means all states.
    pub fn on_all_changes(
        &self,
        discriminator: impl Fn(&V) -> bool + Send + Sync + 'static,
        states: &[S],
    ) -> StoreStream<K, V, S> {
        StoreStream {
            store: self.name.clone(),
            changes: self.changes.clone(),
            key: None,
            states: states.to_vec(),
            discriminator: Some(Arc::new(discriminator)),
        }
    }

    // ---- mutation protocol -------------------------------------------------

    /// Posts a mutation envelope to subscribed mutators. At most one of
    /// `on_success` / `on_error` is eventually invoked, by whichever reply
    /// the mutator issues first.
    pub fn mutate(
        &self,
        value: V,
        mutation_type: S,
        on_success: Option<SuccessHandler<V>>,
        on_error: Option<ErrorHandler>,
    ) {
        let envelope = Arc::new(MutateEnvelope::new(
            &self.name,
            value,
            mutation_type,
            on_success,
            on_error,
        ));
        match self.mutations.next(&envelope) {
            Some(0) | None => {
                warn!(
                    "{STORE_TAG} {} store='{}': no mutator subscribed",
                    events::STORE_MUTATION_UNHANDLED,
                    self.name
                );
            }
            Some(_) => {}
        }
    }

    /// Sink for mutators, filtered to the given mutation types. An empty list
    /// means all types.
    pub fn on_mutation_request(&self, mutation_types: &[S]) -> MutationStream<V, S> {
        MutationStream {
            mutations: self.mutations.clone(),
            mutation_types: mutation_types.to_vec(),
        }
    }
}

/// Filtered view over a store's change stream.
pub struct StoreStream<K, V, S> {
    store: String,
    changes: Subject<StoreChange<K, V, S>>,
    key: Option<K>,
    states: Vec<S>,
    discriminator: Option<Arc<dyn Fn(&V) -> bool + Send + Sync>>,
}

impl<K, V, S> StoreStream<K, V, S>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn store_name(&self) -> &str {
        &self.store
    }

    pub fn subscribe(
        &self,
        handler: impl Fn(&StoreChange<K, V, S>) + Send + Sync + 'static,
    ) -> Subscription {
        let key = self.key.clone();
        let states = self.states.clone();
        let discriminator = self.discriminator.clone();
        self.changes.subscribe_next(move |change| {
            if let Some(key) = &key {
                if &change.key != key {
                    return;
                }
            }
            if !states.is_empty() && !states.contains(&change.state) {
                return;
            }
            if let Some(discriminator) = &discriminator {
                if !discriminator(&change.value) {
                    return;
                }
            }
            handler(change);
        })
    }
}

/// Mutator-side view over a store's mutation requests.
pub struct MutationStream<V, S> {
    mutations: Subject<Arc<MutateEnvelope<V, S>>>,
    mutation_types: Vec<S>,
}

impl<V, S> MutationStream<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn subscribe(
        &self,
        mutator: impl Fn(&Arc<MutateEnvelope<V, S>>) + Send + Sync + 'static,
    ) -> Subscription {
        let mutation_types = self.mutation_types.clone();
        self.mutations.subscribe_next(move |envelope| {
            if !mutation_types.is_empty() && !mutation_types.contains(envelope.mutation_type()) {
                return;
            }
            mutator(envelope);
        })
    }
}
