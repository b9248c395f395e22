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

use crate::config::ProxyType;
use frame_bus::observability::events;
use frame_bus::streams::lock_unpoisoned;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

const CONTROL_TAG: &str = "ProxyControl:";

/// Commands carried on the reserved control channel. The command name travels
/// as a plain string so that unknown commands from newer peers degrade to a
/// warning instead of a parse failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProxyControlCommand {
    RegisterEventBus,
    BusStartListening,
    BusStopListening,
}

impl ProxyControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyControlCommand::RegisterEventBus => "RegisterEventBus",
            ProxyControlCommand::BusStartListening => "BusStartListening",
            ProxyControlCommand::BusStopListening => "BusStopListening",
        }
    }

    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "RegisterEventBus" => Some(ProxyControlCommand::RegisterEventBus),
            "BusStartListening" => Some(ProxyControlCommand::BusStartListening),
            "BusStopListening" => Some(ProxyControlCommand::BusStopListening),
            _ => None,
        }
    }
}

/// Payload of a control frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPayload {
    pub command: String,
    /// The id of the bus instance the command concerns.
    pub body: String,
    #[serde(rename = "proxyType")]
    pub proxy_type: ProxyType,
}

impl ControlPayload {
    pub fn new(command: ProxyControlCommand, bus_id: &str, proxy_type: ProxyType) -> Self {
        Self {
            command: command.as_str().to_string(),
            body: bus_id.to_string(),
            proxy_type,
        }
    }
}

/// Per known child bus: its declared role and whether it is listening.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProxyInstanceState {
    pub proxy_type: ProxyType,
    pub active: bool,
}

/// Registry of bus instances known through control traffic. Mutated only by
/// receipt of well-formed control frames.
#[derive(Default)]
pub struct ProxyInstanceRegistry {
    instances: Mutex<HashMap<String, ProxyInstanceState>>,
}

impl ProxyInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, command: ProxyControlCommand, bus_id: &str, proxy_type: ProxyType) {
        let mut instances = lock_unpoisoned(&self.instances);
        match command {
            ProxyControlCommand::RegisterEventBus => {
                instances.insert(
                    bus_id.to_string(),
                    ProxyInstanceState {
                        proxy_type,
                        active: true,
                    },
                );
                debug!(
                    "{CONTROL_TAG} {} bus='{bus_id}' type={proxy_type:?}",
                    events::PROXY_CONTROL_APPLIED
                );
            }
            ProxyControlCommand::BusStartListening | ProxyControlCommand::BusStopListening => {
                let active = command == ProxyControlCommand::BusStartListening;
                match instances.get_mut(bus_id) {
                    Some(state) => {
                        state.active = active;
                        debug!(
                            "{CONTROL_TAG} {} bus='{bus_id}' active={active}",
                            events::PROXY_CONTROL_APPLIED
                        );
                    }
                    None => {
                        warn!("{CONTROL_TAG} listening state for unregistered bus '{bus_id}'");
                    }
                }
            }
        }
    }

    pub fn get(&self, bus_id: &str) -> Option<ProxyInstanceState> {
        lock_unpoisoned(&self.instances).get(bus_id).copied()
    }

    /// Ids of registered buses currently listening.
    pub fn active_ids(&self) -> Vec<String> {
        lock_unpoisoned(&self.instances)
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(bus_id, _)| bus_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.instances).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.instances).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_toggle_listening() {
        let registry = ProxyInstanceRegistry::new();

        registry.apply(
            ProxyControlCommand::RegisterEventBus,
            "bus-1",
            ProxyType::Child,
        );
        assert_eq!(
            registry.get("bus-1"),
            Some(ProxyInstanceState {
                proxy_type: ProxyType::Child,
                active: true,
            })
        );

        registry.apply(
            ProxyControlCommand::BusStopListening,
            "bus-1",
            ProxyType::Child,
        );
        assert_eq!(registry.active_ids(), Vec::<String>::new());

        registry.apply(
            ProxyControlCommand::BusStartListening,
            "bus-1",
            ProxyType::Child,
        );
        assert_eq!(registry.active_ids(), vec!["bus-1".to_string()]);
    }

    #[test]
    fn listening_toggle_for_unknown_bus_is_ignored() {
        let registry = ProxyInstanceRegistry::new();

        registry.apply(
            ProxyControlCommand::BusStartListening,
            "ghost",
            ProxyType::Child,
        );

        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_command_names_do_not_parse() {
        assert_eq!(ProxyControlCommand::parse("RegisterEventBus"), Some(ProxyControlCommand::RegisterEventBus));
        assert_eq!(ProxyControlCommand::parse("SelfDestruct"), None);
    }
}
