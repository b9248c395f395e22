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
use crate::control::{ControlPayload, ProxyControlCommand};
use frame_bus::fabric::PROXY_CONTROL_CHANNEL;
use frame_bus::{BusFault, Message, MessageKind, Payload};
use serde::{Deserialize, Serialize};

/// One frame-boundary message, exactly as posted between windows.
///
/// For relayed kernel traffic the payload is the serialized [`Message`], so
/// correlation ids survive the crossing; foreign senders may also post a bare
/// payload, which re-enters the kernel under a fresh id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyFrame {
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub payload: Payload,
    pub from: String,
    #[serde(default)]
    pub control: Option<String>,
}

impl ProxyFrame {
    /// Wraps a kernel message for the frame boundary.
    pub fn for_message(channel: &str, message: &Message, from: &str) -> Result<Self, BusFault> {
        let payload = serde_json::to_value(message).map_err(|error| {
            BusFault::MalformedProxyMessage(format!("message failed to serialize: {error}"))
        })?;
        Ok(Self {
            channel: channel.to_string(),
            kind: message.kind,
            payload,
            from: from.to_string(),
            control: None,
        })
    }

    /// Builds a control frame on the reserved control channel.
    pub fn for_control(
        command: ProxyControlCommand,
        bus_id: &str,
        proxy_type: ProxyType,
        from: &str,
    ) -> Self {
        let payload = ControlPayload::new(command, bus_id, proxy_type);
        Self {
            channel: PROXY_CONTROL_CHANNEL.to_string(),
            kind: MessageKind::Control,
            // ControlPayload serialization cannot fail: strings and a unit
            // enum only.
            payload: serde_json::to_value(&payload).unwrap_or(Payload::Null),
            from: from.to_string(),
            control: Some(command.as_str().to_string()),
        }
    }

    /// Whether the payload satisfies the structural contract: present and
    /// non-empty.
    pub fn has_payload(&self) -> bool {
        match &self.payload {
            Payload::Null => false,
            Payload::String(text) => !text.is_empty(),
            _ => true,
        }
    }
}
