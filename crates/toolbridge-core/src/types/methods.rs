//! Method and notification names.

/// Handshake request.
pub const INITIALIZE: &str = "initialize";
/// Liveness check, valid in both directions.
pub const PING: &str = "ping";
/// Enumerate tools.
pub const TOOLS_LIST: &str = "tools/list";
/// Invoke a tool.
pub const TOOLS_CALL: &str = "tools/call";
/// Enumerate resources.
pub const RESOURCES_LIST: &str = "resources/list";
/// Read one resource.
pub const RESOURCES_READ: &str = "resources/read";
/// Enumerate resource templates.
pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";

/// Sent by the client once the handshake result has been accepted.
pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
/// The server's tool set changed.
pub const NOTIFICATION_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
/// The server's resource set changed.
pub const NOTIFICATION_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
/// One resource's contents changed.
pub const NOTIFICATION_RESOURCES_UPDATED: &str = "notifications/resources/updated";
/// Server log line.
pub const NOTIFICATION_MESSAGE: &str = "notifications/message";
