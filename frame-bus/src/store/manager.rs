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

use crate::fault::BusFault;
use crate::observability::events;
use crate::store::BusStore;
use crate::streams::lock_unpoisoned;
use log::{debug, error};
use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

const MANAGER_TAG: &str = "StoreManager:";

/// Type-erased view of a registered store, used by the manager and the ready
/// join. Typed access goes through [`StoreManager::get_store`].
pub trait StoreHandle: Send + Sync {
    fn store_name(&self) -> &str;

    fn ready(&self) -> bool;

    fn notify_when_ready(&self, waiter: Box<dyn FnOnce() + Send>);

    /// Clears values, keeping the registration and subscribers.
    fn wipe(&self);

    /// Completes the store's streams.
    fn close(&self);

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K, V, S> StoreHandle for BusStore<K, V, S>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
{
    fn store_name(&self) -> &str {
        self.name()
    }

    fn ready(&self) -> bool {
        self.is_ready()
    }

    fn notify_when_ready(&self, waiter: Box<dyn FnOnce() + Send>) {
        self.when_ready(waiter);
    }

    fn wipe(&self) {
        self.reset();
    }

    fn close(&self) {
        self.close_store();
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct JoinState {
    ready: HashMap<String, Arc<dyn StoreHandle>>,
    callbacks: Vec<Box<dyn FnOnce(Vec<Arc<dyn StoreHandle>>) + Send>>,
    fired: bool,
}

struct ReadyJoinInner {
    order: Vec<String>,
    state: Mutex<JoinState>,
}

impl ReadyJoinInner {
    fn mark_ready(&self, name: &str, handle: Arc<dyn StoreHandle>) {
        let (callbacks, joined) = {
            let mut state = lock_unpoisoned(&self.state);
            state.ready.insert(name.to_string(), handle);
            if state.fired || state.ready.len() < self.order.len() {
                return;
            }
            state.fired = true;
            let joined = self.joined_in_order(&state);
            (std::mem::take(&mut state.callbacks), joined)
        };
        for callback in callbacks {
            callback(joined.clone());
        }
    }

    fn joined_in_order(&self, state: &JoinState) -> Vec<Arc<dyn StoreHandle>> {
        self.order
            .iter()
            .filter_map(|name| state.ready.get(name).cloned())
            .collect()
    }
}

/// Completes once every joined store has become ready, delivering the joined
/// stores in the order they were requested.
pub struct ReadyJoinHandle {
    inner: Arc<ReadyJoinInner>,
}

impl ReadyJoinHandle {
    /// Runs `callback` when the join completes; synchronously when it already
    /// has.
    pub fn when_ready(&self, callback: impl FnOnce(Vec<Arc<dyn StoreHandle>>) + Send + 'static) {
        let joined = {
            let mut state = lock_unpoisoned(&self.inner.state);
            if !state.fired {
                state.callbacks.push(Box::new(callback));
                return;
            }
            self.inner.joined_in_order(&state)
        };
        callback(joined);
    }

    pub fn is_complete(&self) -> bool {
        lock_unpoisoned(&self.inner.state).fired
    }
}

/// Owner of every store of one bus instance.
pub struct StoreManager {
    stores: Mutex<HashMap<String, Arc<dyn StoreHandle>>>,
    pending_joins: Mutex<HashMap<String, Vec<Arc<ReadyJoinInner>>>>,
}

impl Default for StoreManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreManager {
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
            pending_joins: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up or creates the named store with the given typing. Asking for
    /// an existing store under a different typing is refused.
    pub fn create_store<K, V, S>(&self, name: &str) -> Result<Arc<BusStore<K, V, S>>, BusFault>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        S: Clone + PartialEq + Send + Sync + 'static,
    {
        let (store, created) = {
            let mut stores = lock_unpoisoned(&self.stores);
            match stores.get(name) {
                Some(existing) => {
                    let store = Self::downcast::<K, V, S>(name, existing.clone())?;
                    (store, false)
                }
                None => {
                    let store = Arc::new(BusStore::<K, V, S>::new(name));
                    let handle: Arc<dyn StoreHandle> = store.clone();
                    stores.insert(name.to_string(), handle);
                    (store, true)
                }
            }
        };

        if created {
            debug!("{MANAGER_TAG} {} store='{name}'", events::STORE_CREATED);
            let handle: Arc<dyn StoreHandle> = store.clone();
            self.wire_pending_joins(name, handle);
        }
        Ok(store)
    }

    /// Typed lookup of an existing store.
    pub fn get_store<K, V, S>(&self, name: &str) -> Option<Arc<BusStore<K, V, S>>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        S: Clone + PartialEq + Send + Sync + 'static,
    {
        let handle = lock_unpoisoned(&self.stores).get(name).cloned()?;
        Self::downcast::<K, V, S>(name, handle).ok()
    }

    fn downcast<K, V, S>(
        name: &str,
        handle: Arc<dyn StoreHandle>,
    ) -> Result<Arc<BusStore<K, V, S>>, BusFault>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        S: Clone + PartialEq + Send + Sync + 'static,
    {
        handle.as_any_arc().downcast::<BusStore<K, V, S>>().map_err(|_| {
            let fault = BusFault::InvalidConfiguration(format!(
                "store '{name}' is registered with a different typing"
            ));
            error!("{MANAGER_TAG} {} {fault}", events::STORE_TYPE_MISMATCH);
            fault
        })
    }

    /// Closes and forgets the named store.
    pub fn destroy_store(&self, name: &str) -> bool {
        let removed = lock_unpoisoned(&self.stores).remove(name);
        match removed {
            Some(handle) => {
                debug!("{MANAGER_TAG} {} store='{name}'", events::STORE_DESTROYED);
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Resets every store, keeping registrations and subscribers.
    pub fn wipe_all_stores(&self) {
        let handles: Vec<Arc<dyn StoreHandle>> =
            lock_unpoisoned(&self.stores).values().cloned().collect();
        for handle in handles {
            handle.wipe();
        }
    }

    pub fn get_all_stores(&self) -> Vec<Arc<dyn StoreHandle>> {
        lock_unpoisoned(&self.stores).values().cloned().collect()
    }

    pub fn store_count(&self) -> usize {
        lock_unpoisoned(&self.stores).len()
    }

    /// Joins on the named stores becoming ready. Stores that do not exist yet
    /// are joined on demand, when they are created.
    pub fn ready_join(&self, names: &[&str]) -> ReadyJoinHandle {
        let inner = Arc::new(ReadyJoinInner {
            order: names.iter().map(|name| name.to_string()).collect(),
            state: Mutex::new(JoinState {
                ready: HashMap::new(),
                callbacks: Vec::new(),
                fired: false,
            }),
        });

        let mut existing: Vec<(String, Arc<dyn StoreHandle>)> = Vec::new();
        {
            let stores = lock_unpoisoned(&self.stores);
            let mut pending = lock_unpoisoned(&self.pending_joins);
            for name in names {
                match stores.get(*name) {
                    Some(handle) => existing.push((name.to_string(), handle.clone())),
                    None => pending
                        .entry(name.to_string())
                        .or_default()
                        .push(inner.clone()),
                }
            }
        }

        for (name, handle) in existing {
            Self::wire_join(inner.clone(), &name, handle);
        }

        ReadyJoinHandle { inner }
    }

    fn wire_pending_joins(&self, name: &str, handle: Arc<dyn StoreHandle>) {
        let joins = lock_unpoisoned(&self.pending_joins).remove(name);
        let Some(joins) = joins else {
            return;
        };
        for join in joins {
            Self::wire_join(join, name, handle.clone());
        }
    }

    fn wire_join(join: Arc<ReadyJoinInner>, name: &str, handle: Arc<dyn StoreHandle>) {
        let name = name.to_string();
        let handle_for_waiter = handle.clone();
        handle.notify_when_ready(Box::new(move || {
            join.mark_ready(&name, handle_for_waiter);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Names = BusStore<String, String, &'static str>;

    #[test]
    fn create_store_is_idempotent_per_typing() {
        let manager = StoreManager::new();

        let first = manager
            .create_store::<String, String, &'static str>("names")
            .expect("create should succeed");
        let second = manager
            .create_store::<String, String, &'static str>("names")
            .expect("reuse should succeed");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.store_count(), 1);
    }

    #[test]
    fn conflicting_typing_is_refused() {
        let manager = StoreManager::new();
        manager
            .create_store::<String, String, &'static str>("names")
            .expect("create should succeed");

        let conflict = manager.create_store::<String, u32, &'static str>("names");

        assert!(conflict.is_err());
        assert!(manager.get_store::<String, u32, &'static str>("names").is_none());
    }

    #[test]
    fn destroy_store_closes_and_forgets() {
        let manager = StoreManager::new();
        let store = manager
            .create_store::<String, String, &'static str>("names")
            .expect("create should succeed");

        assert!(manager.destroy_store("names"));
        assert!(store.is_closed());
        assert!(!manager.destroy_store("names"));
        assert_eq!(manager.store_count(), 0);
    }

    #[test]
    fn wipe_all_stores_keeps_registrations() {
        let manager = StoreManager::new();
        let store: Arc<Names> = manager.create_store("names").expect("create should succeed");
        store.put("k".to_string(), "v".to_string(), "created");

        manager.wipe_all_stores();

        assert!(store.is_empty());
        assert_eq!(manager.store_count(), 1);
    }

    #[test]
    fn ready_join_fires_after_every_store_is_ready() {
        let manager = StoreManager::new();
        let join = manager.ready_join(&["ember", "fox"]);
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in = fired.clone();
        join.when_ready(move |stores| {
            assert_eq!(stores.len(), 2);
            assert_eq!(stores[0].store_name(), "ember");
            assert_eq!(stores[1].store_name(), "fox");
            fired_in.fetch_add(1, Ordering::SeqCst);
        });

        let ember: Arc<Names> = manager.create_store("ember").expect("create should succeed");
        ember.put("fox".to_string(), "honk".to_string(), "created");
        ember.initialize();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let fox: Arc<Names> = manager.create_store("fox").expect("create should succeed");
        fox.initialize();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Late joiners resolve synchronously.
        let fired_late = fired.clone();
        join.when_ready(move |_| {
            fired_late.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
