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

//! Reserved channel and store names. These are part of the wire contract and
//! must not drift.

use lazy_static::lazy_static;
use std::collections::HashSet;

/// Proxy control traffic between bus instances in different frames.
pub const PROXY_CONTROL_CHANNEL: &str = "__proxycontrol__";
/// Meta-channel name under which the monitor stream is addressed externally.
pub const MONITOR_STREAM_CHANNEL: &str = "#bus-monitor";
/// REST transport collaborator requests and replies.
pub const REST_SERVICE_CHANNEL: &str = "fabric-rest";
/// Fabric version request/response traffic.
pub const FABRIC_VERSION_CHANNEL: &str = "fabric-version";
/// Fabric connection lifecycle notifications.
pub const FABRIC_CONNECTION_CHANNEL: &str = "fabric-connection";

/// Store carrying organization state.
pub const ORGS_STORE: &str = "ORGS";
/// Key of the current organization id inside [`ORGS_STORE`].
pub const ORG_ID_KEY: &str = "ORG_ID";

lazy_static! {
    static ref RESERVED_CHANNELS: HashSet<&'static str> = [
        PROXY_CONTROL_CHANNEL,
        MONITOR_STREAM_CHANNEL,
        REST_SERVICE_CHANNEL,
        FABRIC_VERSION_CHANNEL,
        FABRIC_CONNECTION_CHANNEL,
    ]
    .iter()
    .copied()
    .collect();
}

/// Whether a channel name is reserved by the bus itself.
pub fn is_reserved_channel(name: &str) -> bool {
    RESERVED_CHANNELS.contains(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_are_honoured_exactly() {
        assert!(is_reserved_channel("__proxycontrol__"));
        assert!(is_reserved_channel("fabric-rest"));
        assert!(!is_reserved_channel("chat"));
        assert_eq!(ORGS_STORE, "ORGS");
        assert_eq!(ORG_ID_KEY, "ORG_ID");
    }
}
