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

use crate::bus::{EventBus, MessageHandler};
use crate::fabric::channels::{
    FABRIC_CONNECTION_CHANNEL, FABRIC_VERSION_CHANNEL, ORGS_STORE, ORG_ID_KEY,
    REST_SERVICE_CHANNEL,
};
use crate::fault::BusFault;
use crate::model::{Message, MessageId};
use crate::observability::events;
use crate::store::{BusStore, StoreManager};
use crate::streams::{lock_unpoisoned, Subject, Subscription};
use log::{debug, info};
use serde_json::json;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const FABRIC_TAG: &str = "FabricFacade:";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Connected,
    Disconnecting,
    Disconnected,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnecting => write!(f, "disconnecting"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Read handle on the connection state stream.
#[derive(Clone)]
pub struct ConnectionStateStream {
    subject: Subject<ConnectionState>,
}

impl ConnectionStateStream {
    pub fn subscribe_next<F>(&self, next: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.subject.subscribe_next(next)
    }
}

/// Facade over the remote-broker fabric: connection, org and version state
/// expressed through well-known channels and the ORGS store. No behaviour of
/// its own beyond that mapping; the fabric itself is an external
/// collaborator.
pub struct FabricFacade {
    bus: EventBus,
    orgs: Arc<BusStore<String, String, String>>,
    state: Mutex<ConnectionState>,
    state_stream: Subject<ConnectionState>,
    remote_rest: AtomicBool,
}

impl FabricFacade {
    pub fn new(bus: EventBus, stores: &StoreManager) -> Result<Self, BusFault> {
        // Pin the well-known channels so fabric traffic is never dropped for
        // want of a channel.
        bus.get_channel(FABRIC_CONNECTION_CHANNEL)?;
        bus.get_channel(FABRIC_VERSION_CHANNEL)?;
        bus.get_channel(REST_SERVICE_CHANNEL)?;
        let orgs = stores.create_store::<String, String, String>(ORGS_STORE)?;

        Ok(Self {
            bus,
            orgs,
            state: Mutex::new(ConnectionState::Disconnected),
            state_stream: Subject::new(),
            remote_rest: AtomicBool::new(false),
        })
    }

    pub fn is_connected(&self) -> bool {
        *lock_unpoisoned(&self.state) == ConnectionState::Connected
    }

    /// Marks the fabric connected and announces the transition on the
    /// connection channel. Connecting twice is a no-op.
    pub fn connect(&self) {
        if !self.transition(ConnectionState::Connected) {
            return;
        }
        info!("{FABRIC_TAG} {}", events::FABRIC_CONNECTED);
        self.announce(ConnectionState::Connected);
    }

    /// Marks the fabric disconnected, passing through the disconnecting
    /// state. Disconnecting twice is a no-op.
    pub fn disconnect(&self) {
        if !self.transition(ConnectionState::Disconnecting) {
            return;
        }
        self.announce(ConnectionState::Disconnecting);

        self.transition(ConnectionState::Disconnected);
        info!("{FABRIC_TAG} {}", events::FABRIC_DISCONNECTED);
        self.announce(ConnectionState::Disconnected);
    }

    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        if *state == next
            || (next == ConnectionState::Disconnecting
                && *state == ConnectionState::Disconnected)
        {
            return false;
        }
        *state = next;
        true
    }

    fn announce(&self, state: ConnectionState) {
        self.bus.send(
            FABRIC_CONNECTION_CHANNEL,
            Message::control(
                MessageId::generate(),
                json!({ "state": state.to_string() }),
                self.bus.instance_id(),
            ),
        );
        self.state_stream.next(&state);
    }

    pub fn when_connection_state_changes(&self) -> ConnectionStateStream {
        ConnectionStateStream {
            subject: self.state_stream.clone(),
        }
    }

    /// Writes the current org id into the ORGS store.
    pub fn set_fabric_current_org_id(&self, org_id: &str) {
        debug!("{FABRIC_TAG} {} org='{org_id}'", events::FABRIC_ORG_SWITCHED);
        self.orgs.put(
            ORG_ID_KEY.to_string(),
            org_id.to_string(),
            "switched".to_string(),
        );
    }

    pub fn get_fabric_current_org_id(&self) -> Option<String> {
        self.orgs.get(&ORG_ID_KEY.to_string())
    }

    /// Once-style request for the fabric version. The returned handler
    /// resolves with the version string as its response payload.
    pub fn get_fabric_version(&self, sender: &str) -> MessageHandler {
        self.bus.request_once_with_id(
            MessageId::generate(),
            FABRIC_VERSION_CHANNEL,
            json!("version"),
            None,
            sender,
        )
    }

    /// Routes REST traffic through the remote fabric service (true) or the
    /// local transport (false). The toggle is announced on the REST channel
    /// so the transport collaborator can reconfigure itself.
    pub fn use_fabric_rest_service(&self, remote: bool) {
        self.remote_rest.store(remote, Ordering::Relaxed);
        self.bus.send(
            REST_SERVICE_CHANNEL,
            Message::control(
                MessageId::generate(),
                json!({ "remoteRestService": remote }),
                self.bus.instance_id(),
            ),
        );
    }

    pub fn is_rest_service_remote(&self) -> bool {
        self.remote_rest.load(Ordering::Relaxed)
    }
}
