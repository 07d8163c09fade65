//! JSON-RPC method names of the protocol surface

pub const INITIALIZE: &str = "initialize";
pub const AUTHENTICATE: &str = "authenticate";
pub const SESSION_NEW: &str = "session/new";
pub const SESSION_LOAD: &str = "session/load";
pub const SESSION_PROMPT: &str = "session/prompt";
pub const SESSION_SET_MODE: &str = "session/set_mode";
pub const SESSION_CANCEL: &str = "session/cancel";

pub const SESSION_UPDATE: &str = "session/update";
pub const SESSION_REQUEST_PERMISSION: &str = "session/request_permission";
pub const FS_READ_TEXT_FILE: &str = "fs/read_text_file";
pub const FS_WRITE_TEXT_FILE: &str = "fs/write_text_file";
pub const TERMINAL_CREATE: &str = "terminal/create";
pub const TERMINAL_OUTPUT: &str = "terminal/output";
pub const TERMINAL_WAIT_FOR_EXIT: &str = "terminal/wait_for_exit";
pub const TERMINAL_KILL: &str = "terminal/kill";
pub const TERMINAL_RELEASE: &str = "terminal/release";

/// Requests a client sends to an agent
pub const CLIENT_REQUESTS: &[&str] = &[
    INITIALIZE,
    AUTHENTICATE,
    SESSION_NEW,
    SESSION_LOAD,
    SESSION_PROMPT,
    SESSION_SET_MODE,
];

/// Notifications a client sends to an agent
pub const CLIENT_NOTIFICATIONS: &[&str] = &[SESSION_CANCEL];

/// Requests an agent sends to a client
pub const AGENT_REQUESTS: &[&str] = &[
    SESSION_REQUEST_PERMISSION,
    FS_READ_TEXT_FILE,
    FS_WRITE_TEXT_FILE,
    TERMINAL_CREATE,
    TERMINAL_OUTPUT,
    TERMINAL_WAIT_FOR_EXIT,
    TERMINAL_KILL,
    TERMINAL_RELEASE,
];

/// Notifications an agent sends to a client
pub const AGENT_NOTIFICATIONS: &[&str] = &[SESSION_UPDATE];

pub fn is_client_method(method: &str) -> bool {
    CLIENT_REQUESTS.contains(&method) || CLIENT_NOTIFICATIONS.contains(&method)
}

pub fn is_agent_method(method: &str) -> bool {
    AGENT_REQUESTS.contains(&method) || AGENT_NOTIFICATIONS.contains(&method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tables_are_disjoint() {
        for method in CLIENT_REQUESTS.iter().chain(CLIENT_NOTIFICATIONS) {
            assert!(!is_agent_method(method), "{} listed for both sides", method);
        }
        for method in AGENT_REQUESTS.iter().chain(AGENT_NOTIFICATIONS) {
            assert!(!is_client_method(method), "{} listed for both sides", method);
        }
    }

    #[test]
    fn test_extension_methods_belong_to_neither_side() {
        assert!(!is_client_method("_zed/ping"));
        assert!(!is_agent_method("_zed/ping"));
    }
}
