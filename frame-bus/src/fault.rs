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

//! Fault taxonomy shared across the bus kernel, store subsystem and proxy.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Synthetic transport failure produced by mock responders.
pub const TRANSPORT_CODE_MOCK_FAILURE: u16 = 400;
/// The requested operation is not implemented by the transport.
pub const TRANSPORT_CODE_UNIMPLEMENTED: u16 = 444;
/// The service request could not be understood.
pub const TRANSPORT_CODE_INVALID_SERVICE_REQUEST: u16 = 505;

/// Everything that can go wrong inside the bus, in one place.
///
/// Faults are reported, not thrown: callers receive them as `Result` errors
/// from configuration-time APIs, while runtime violations are logged and
/// surfaced on the monitor stream so tests can assert against a single sink.
#[derive(Clone, PartialEq, Eq)]
pub enum BusFault {
    /// A component was asked to start without a usable configuration.
    InvalidConfiguration(String),
    /// A proxied message named a channel outside the authorised set.
    UnauthorizedChannel(String),
    /// A frame message arrived from an origin outside the allowlist.
    UnauthorizedOrigin(String),
    /// A frame message did not carry the required structure.
    MalformedProxyMessage(String),
    /// A delivery had no handler registered to receive it.
    MissingSubscriberHandler(String),
    /// An operation targeted a channel that is closed or was never opened.
    ClosedChannel(String),
    /// A bulk load was rejected because the store was already populated.
    PopulateRejected(String),
    /// A mutation envelope was replied to more than once.
    MutationDoubleReply(String),
    /// A proxy control frame carried a command this build does not know.
    UnknownControl(String),
    /// A transport-level failure, mirroring REST error semantics.
    TransportError { code: u16, message: String },
}

impl BusFault {
    /// Builds the synthetic transport error used when a request is made on a
    /// closed channel.
    pub fn closed_channel_transport(channel: &str) -> Self {
        BusFault::TransportError {
            code: TRANSPORT_CODE_INVALID_SERVICE_REQUEST,
            message: format!("channel '{channel}' is closed"),
        }
    }
}

impl Debug for BusFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BusFault::InvalidConfiguration(detail) => {
                write!(f, "InvalidConfiguration({detail})")
            }
            BusFault::UnauthorizedChannel(channel) => write!(f, "UnauthorizedChannel({channel})"),
            BusFault::UnauthorizedOrigin(origin) => write!(f, "UnauthorizedOrigin({origin})"),
            BusFault::MalformedProxyMessage(detail) => write!(f, "MalformedProxyMessage({detail})"),
            BusFault::MissingSubscriberHandler(detail) => {
                write!(f, "MissingSubscriberHandler({detail})")
            }
            BusFault::ClosedChannel(channel) => write!(f, "ClosedChannel({channel})"),
            BusFault::PopulateRejected(store) => write!(f, "PopulateRejected({store})"),
            BusFault::MutationDoubleReply(store) => write!(f, "MutationDoubleReply({store})"),
            BusFault::UnknownControl(command) => write!(f, "UnknownControl({command})"),
            BusFault::TransportError { code, message } => {
                write!(f, "TransportError({code}, {message})")
            }
        }
    }
}

impl Display for BusFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BusFault::InvalidConfiguration(detail) => {
                write!(f, "invalid configuration: {detail}")
            }
            BusFault::UnauthorizedChannel(channel) => {
                write!(f, "channel '{channel}' is not authorised")
            }
            BusFault::UnauthorizedOrigin(origin) => {
                write!(f, "origin '{origin}' is not in the allowlist")
            }
            BusFault::MalformedProxyMessage(detail) => {
                write!(f, "malformed proxy message: {detail}")
            }
            BusFault::MissingSubscriberHandler(detail) => {
                write!(f, "no handler registered for delivery: {detail}")
            }
            BusFault::ClosedChannel(channel) => write!(f, "channel '{channel}' is closed"),
            BusFault::PopulateRejected(store) => {
                write!(f, "store '{store}' was already populated")
            }
            BusFault::MutationDoubleReply(store) => {
                write!(f, "mutation envelope for store '{store}' was already replied to")
            }
            BusFault::UnknownControl(command) => {
                write!(f, "unknown proxy control command '{command}'")
            }
            BusFault::TransportError { code, message } => {
                write!(f, "transport error {code}: {message}")
            }
        }
    }
}

impl Error for BusFault {}
