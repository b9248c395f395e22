//! Canonical structured event names used in log lines across the workspace.

// Channel lifecycle events.
pub const CHANNEL_CREATED: &str = "channel_created";
pub const CHANNEL_CLOSED: &str = "channel_closed";
pub const CHANNEL_DESTROYED: &str = "channel_destroyed";
pub const SUBSCRIBER_ADDED: &str = "subscriber_added";
pub const SUBSCRIBER_REMOVED: &str = "subscriber_removed";

// Kernel send-path events.
pub const MESSAGE_SENT: &str = "message_sent";
pub const MESSAGE_DROPPED: &str = "message_dropped";
pub const SEND_ON_CLOSED_CHANNEL: &str = "send_on_closed_channel";
pub const REQUEST_ON_CLOSED_CHANNEL: &str = "request_on_closed_channel";
pub const HANDLER_MISSING: &str = "handler_missing";

// Store subsystem events.
pub const STORE_CREATED: &str = "store_created";
pub const STORE_DESTROYED: &str = "store_destroyed";
pub const STORE_POPULATE_REJECTED: &str = "store_populate_rejected";
pub const STORE_MUTATION_UNHANDLED: &str = "store_mutation_unhandled";
pub const STORE_MUTATION_DOUBLE_REPLY: &str = "store_mutation_double_reply";
pub const STORE_TYPE_MISMATCH: &str = "store_type_mismatch";

// Proxy events.
pub const PROXY_FRAME_DROPPED_OWN: &str = "proxy_frame_dropped_own";
pub const PROXY_FRAME_DROPPED_ORIGIN: &str = "proxy_frame_dropped_origin";
pub const PROXY_FRAME_DROPPED_MALFORMED: &str = "proxy_frame_dropped_malformed";
pub const PROXY_FRAME_DROPPED_CHANNEL: &str = "proxy_frame_dropped_channel";
pub const PROXY_CONTROL_APPLIED: &str = "proxy_control_applied";
pub const PROXY_CONTROL_UNKNOWN: &str = "proxy_control_unknown";
pub const PROXY_RELAY_OUT: &str = "proxy_relay_out";
pub const PROXY_REBROADCAST_SUPPRESSED: &str = "proxy_rebroadcast_suppressed";

// Fabric facade events.
pub const FABRIC_CONNECTED: &str = "fabric_connected";
pub const FABRIC_DISCONNECTED: &str = "fabric_disconnected";
pub const FABRIC_ORG_SWITCHED: &str = "fabric_org_switched";
