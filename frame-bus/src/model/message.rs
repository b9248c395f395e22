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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Protocol version stamped on every message emitted by this build.
pub const PROTOCOL_VERSION: u16 = 1;

/// Payloads are JSON-compatible values; typed shells sit above this at the
/// channel layer, and stores keep their own static typing.
pub type Payload = serde_json::Value;

/// Opaque correlation identifier. Equality defines correlation; nothing else
/// about the contained string is interpreted.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a fresh identifier, unique per message.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four message kinds carried over channels.
///
/// Serialized names match the wire format exactly.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    Request,
    Response,
    Error,
    Control,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Request => write!(f, "Request"),
            MessageKind::Response => write!(f, "Response"),
            MessageKind::Error => write!(f, "Error"),
            MessageKind::Control => write!(f, "Control"),
        }
    }
}

/// One publication event. Immutable once emitted; the kernel shares messages
/// as `Arc<Message>` and never hands out mutable access.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub payload: Payload,
    pub sender: String,
    pub version: u16,
    /// Marks a message that re-entered the kernel from the proxy and must not
    /// be relayed outward again.
    #[serde(default)]
    pub proxy_rebroadcast: bool,
}

impl Message {
    pub fn new(id: MessageId, kind: MessageKind, payload: Payload, sender: &str) -> Self {
        Self {
            id,
            kind,
            payload,
            sender: sender.to_string(),
            version: PROTOCOL_VERSION,
            proxy_rebroadcast: false,
        }
    }

    pub fn request(id: MessageId, payload: Payload, sender: &str) -> Self {
        Self::new(id, MessageKind::Request, payload, sender)
    }

    pub fn response(id: MessageId, payload: Payload, sender: &str) -> Self {
        Self::new(id, MessageKind::Response, payload, sender)
    }

    pub fn error(id: MessageId, payload: Payload, sender: &str) -> Self {
        Self::new(id, MessageKind::Error, payload, sender)
    }

    pub fn control(id: MessageId, payload: Payload, sender: &str) -> Self {
        Self::new(id, MessageKind::Control, payload, sender)
    }

    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == MessageKind::Response
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    pub fn is_control(&self) -> bool {
        self.kind == MessageKind::Control
    }

    /// Copy builder used by the proxy when a relayed message re-enters the
    /// kernel: id, kind, payload and version are preserved, the sender is
    /// replaced and the rebroadcast mark is set.
    pub fn rebroadcast_copy(&self, sender: &str) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            payload: self.payload.clone(),
            sender: sender.to_string(),
            version: self.version,
            proxy_rebroadcast: true,
        }
    }
}
