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

use frame_bus::fabric::PROXY_CONTROL_CHANNEL;
use frame_bus::BusFault;
use log::warn;
use serde::{Deserialize, Serialize};

const CONFIG_TAG: &str = "ProxyConfig:";

/// Role of a proxy within the frame topology. `Hybrid` is reserved and is
/// refused at validation time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ProxyType {
    Parent,
    Child,
    Hybrid,
}

/// Configuration surface of one [`crate::MessageProxy`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ProxyConfig {
    pub proxy_type: ProxyType,
    /// Origins frame messages are accepted from. The `*` wildcard is honoured
    /// only when listed explicitly.
    pub accepted_origins: Vec<String>,
    /// Channels authorised to cross the frame boundary. The proxy control
    /// channel is always authorised and need not be listed.
    #[serde(default)]
    pub protected_channels: Vec<String>,
    /// Relay to every child frame rather than a targeted set.
    #[serde(default)]
    pub target_all_frames: bool,
    /// Child bus ids to relay to when not targeting all frames. When empty,
    /// the registered active child buses are targeted.
    #[serde(default)]
    pub target_specific_frames: Vec<String>,
    /// Origin of the parent frame; required for the child role.
    #[serde(default)]
    pub parent_origin: Option<String>,
}

impl ProxyConfig {
    /// Checks the configuration is usable for its role. A failed validation
    /// must refuse operation and never throw into the caller.
    pub fn validate(&self) -> Result<(), BusFault> {
        if self.proxy_type == ProxyType::Hybrid {
            return Err(BusFault::InvalidConfiguration(
                "the hybrid proxy role is reserved and not implemented".to_string(),
            ));
        }
        if self.accepted_origins.is_empty() {
            return Err(BusFault::InvalidConfiguration(
                "at least one accepted origin is required".to_string(),
            ));
        }
        if self.protected_channels.is_empty() {
            return Err(BusFault::InvalidConfiguration(
                "at least one authorised channel is required".to_string(),
            ));
        }
        if self.proxy_type == ProxyType::Child && self.parent_origin.is_none() {
            return Err(BusFault::InvalidConfiguration(
                "the child role requires a parent origin".to_string(),
            ));
        }

        if self
            .protected_channels
            .iter()
            .any(|channel| channel == PROXY_CONTROL_CHANNEL)
        {
            warn!(
                "{CONFIG_TAG} '{PROXY_CONTROL_CHANNEL}' is always authorised and need not be listed"
            );
        }
        Ok(())
    }

    /// Whether an inbound origin passes the allowlist.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.accepted_origins
            .iter()
            .any(|accepted| accepted == origin || accepted == "*")
    }

    /// The origin parent-role relays target on child frames: the wildcard
    /// when explicitly configured, otherwise the first accepted origin.
    pub fn child_target_origin(&self) -> &str {
        self.accepted_origins
            .iter()
            .find(|accepted| accepted.as_str() == "*")
            .or_else(|| self.accepted_origins.first())
            .map(String::as_str)
            .unwrap_or("*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_config() -> ProxyConfig {
        ProxyConfig {
            proxy_type: ProxyType::Parent,
            accepted_origins: vec!["https://a.example".to_string()],
            protected_channels: vec!["chat".to_string()],
            target_all_frames: true,
            target_specific_frames: Vec::new(),
            parent_origin: None,
        }
    }

    #[test]
    fn parent_config_validates() {
        assert!(parent_config().validate().is_ok());
    }

    #[test]
    fn hybrid_role_is_refused() {
        let mut config = parent_config();
        config.proxy_type = ProxyType::Hybrid;

        assert!(matches!(
            config.validate(),
            Err(BusFault::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn child_requires_parent_origin() {
        let mut config = parent_config();
        config.proxy_type = ProxyType::Child;

        assert!(config.validate().is_err());

        config.parent_origin = Some("https://parent.example".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_allowlists_are_refused() {
        let mut config = parent_config();
        config.accepted_origins.clear();
        assert!(config.validate().is_err());

        let mut config = parent_config();
        config.protected_channels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn wildcard_origin_must_be_explicit() {
        let config = parent_config();
        assert!(config.origin_allowed("https://a.example"));
        assert!(!config.origin_allowed("https://b.example"));

        let mut wildcard = parent_config();
        wildcard.accepted_origins.push("*".to_string());
        assert!(wildcard.origin_allowed("https://b.example"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let encoded = r#"{
            "proxyType": "Child",
            "acceptedOrigins": ["https://a.example"],
            "protectedChannels": ["chat"],
            "parentOrigin": "https://parent.example"
        }"#;

        let config: ProxyConfig = serde_json::from_str(encoded).expect("config should parse");

        assert_eq!(config.proxy_type, ProxyType::Child);
        assert!(!config.target_all_frames);
        assert!(config.target_specific_frames.is_empty());
        assert!(config.validate().is_ok());
    }
}
