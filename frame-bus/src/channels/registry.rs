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

use crate::channels::Channel;
use crate::fault::BusFault;
use crate::observability::{events, Monitor, MonitorEvent};
use crate::streams::lock_unpoisoned;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const REGISTRY_TAG: &str = "ChannelRegistry:";

/// Exclusive owner of all channels of one bus instance.
///
/// Channels are created lazily and destroyed when their reference count
/// reaches zero. A destroyed channel stays behind as a completed husk so that
/// stale handles observe closed-channel semantics; the next `get_or_create`
/// under the same name starts a fresh channel.
pub(crate) struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
    monitor: Arc<Monitor>,
}

impl ChannelRegistry {
    pub(crate) fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            monitor,
        }
    }

    pub(crate) fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Looks up or lazily creates a channel and takes one reference on it.
    pub(crate) fn get_or_create(&self, name: &str) -> Result<Arc<Channel>, BusFault> {
        if name.is_empty() {
            return Err(BusFault::InvalidConfiguration(
                "channel names must be non-empty".to_string(),
            ));
        }

        let (channel, created) = {
            let mut channels = lock_unpoisoned(&self.channels);
            match channels.get(name) {
                Some(existing) if !existing.is_closed() => (existing.clone(), false),
                _ => {
                    let fresh = Arc::new(Channel::new(name));
                    channels.insert(name.to_string(), fresh.clone());
                    (fresh, true)
                }
            }
        };
        channel.acquire();

        if created {
            debug!("{REGISTRY_TAG} {} channel='{name}'", events::CHANNEL_CREATED);
            self.monitor.emit_with(|| MonitorEvent::ChannelCreated {
                channel: name.to_string(),
            });
        }
        Ok(channel)
    }

    pub(crate) fn find(&self, name: &str) -> Option<Arc<Channel>> {
        lock_unpoisoned(&self.channels).get(name).cloned()
    }

    /// Releases one explicit close-call reference, destroying the channel
    /// when none remain.
    pub(crate) fn release_ref(&self, name: &str) {
        let Some(channel) = self.find(name) else {
            warn!("{REGISTRY_TAG} close requested for unknown channel '{name}'");
            return;
        };

        let remaining = channel.release();
        debug!(
            "{REGISTRY_TAG} {} channel='{name}' remaining_refs={remaining}",
            events::CHANNEL_CLOSED
        );
        self.monitor.emit_with(|| MonitorEvent::ChannelClosed {
            channel: name.to_string(),
        });

        if remaining == 0 {
            self.destroy(name);
        }
    }

    /// Releases the reference held by one subscription. No close record is
    /// emitted; the subscriber-removed record is the caller's business.
    pub(crate) fn release_subscriber(&self, name: &str) {
        let Some(channel) = self.find(name) else {
            return;
        };
        if channel.release() == 0 {
            self.destroy(name);
        }
    }

    /// Unconditionally terminates a channel. Observers receive completion;
    /// the husk remains until the name is recreated or the registry is wiped.
    pub(crate) fn destroy(&self, name: &str) -> bool {
        let Some(channel) = self.find(name) else {
            return false;
        };
        if channel.is_closed() {
            return false;
        }

        debug!("{REGISTRY_TAG} {} channel='{name}'", events::CHANNEL_DESTROYED);
        self.monitor.emit_with(|| MonitorEvent::ChannelDestroyed {
            channel: name.to_string(),
        });
        channel.stream().complete();
        true
    }

    /// Destroys every channel and forgets the husks.
    pub(crate) fn destroy_all(&self) {
        let drained: Vec<(String, Arc<Channel>)> = {
            let mut channels = lock_unpoisoned(&self.channels);
            channels.drain().collect()
        };

        for (name, channel) in drained {
            if channel.is_closed() {
                continue;
            }
            debug!("{REGISTRY_TAG} {} channel='{name}'", events::CHANNEL_DESTROYED);
            self.monitor.emit_with(|| MonitorEvent::ChannelDestroyed {
                channel: name.clone(),
            });
            channel.stream().complete();
        }
    }

    pub(crate) fn channel_names(&self) -> Vec<String> {
        lock_unpoisoned(&self.channels).keys().cloned().collect()
    }
}
