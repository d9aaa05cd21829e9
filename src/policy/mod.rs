// src/policy/mod.rs

use std::time::Duration;

/// How a request is mapped to the identity its quota is tracked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Authenticated user id when the request carries one, client IP
    /// otherwise. Exactly one of the two per request, never both.
    UserOrIp,
    /// Client IP regardless of authentication
    IpOnly,
}

/// Immutable throttling rule. One static instance per declared policy;
/// nothing mutates these after process start.
#[derive(Debug)]
pub struct Policy {
    pub name: &'static str,
    /// Window duration
    pub window: Duration,
    /// Maximum request count within a window
    pub max_requests: u64,
    pub key_strategy: KeyStrategy,
    /// Successful responses refund their increment, so only failures
    /// consume the budget (login brute-force guard)
    pub skip_successful: bool,
    /// Failed responses refund their increment
    pub skip_failed: bool,
    /// Body message for the 429 rejection
    pub message: &'static str,
}

impl Policy {
    /// Storage key for a derived requester key. The per-policy prefix keeps
    /// counters from colliding across policies for the same requester.
    pub fn storage_key(&self, derived_key: &str) -> String {
        format!("rate_limit:{}:{}", self.name, derived_key)
    }
}

/// The fixed set of named policies applied at the routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    General,
    Auth,
    PasswordReset,
    TaskCreation,
    Proposal,
    Payment,
    Message,
    FileUpload,
    WsMessage,
    Search,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 10] = [
        PolicyKind::General,
        PolicyKind::Auth,
        PolicyKind::PasswordReset,
        PolicyKind::TaskCreation,
        PolicyKind::Proposal,
        PolicyKind::Payment,
        PolicyKind::Message,
        PolicyKind::FileUpload,
        PolicyKind::WsMessage,
        PolicyKind::Search,
    ];

    pub fn policy(self) -> &'static Policy {
        match self {
            PolicyKind::General => &GENERAL,
            PolicyKind::Auth => &AUTH,
            PolicyKind::PasswordReset => &PASSWORD_RESET,
            PolicyKind::TaskCreation => &TASK_CREATION,
            PolicyKind::Proposal => &PROPOSAL,
            PolicyKind::Payment => &PAYMENT,
            PolicyKind::Message => &MESSAGE,
            PolicyKind::FileUpload => &FILE_UPLOAD,
            PolicyKind::WsMessage => &WS_MESSAGE,
            PolicyKind::Search => &SEARCH,
        }
    }
}

static GENERAL: Policy = Policy {
    name: "general",
    window: Duration::from_secs(15 * 60),
    max_requests: 100,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many requests, please try again later.",
};

static AUTH: Policy = Policy {
    name: "auth",
    window: Duration::from_secs(60),
    max_requests: 5,
    key_strategy: KeyStrategy::IpOnly,
    skip_successful: true,
    skip_failed: false,
    message: "Too many login attempts, please try again later.",
};

static PASSWORD_RESET: Policy = Policy {
    name: "password_reset",
    window: Duration::from_secs(60 * 60),
    max_requests: 3,
    key_strategy: KeyStrategy::IpOnly,
    skip_successful: false,
    skip_failed: false,
    message: "Too many password reset requests, please try again later.",
};

static TASK_CREATION: Policy = Policy {
    name: "task_creation",
    window: Duration::from_secs(60 * 60),
    max_requests: 10,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many tasks created, please try again later.",
};

static PROPOSAL: Policy = Policy {
    name: "proposal",
    window: Duration::from_secs(60 * 60),
    max_requests: 20,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many proposals submitted, please try again later.",
};

static PAYMENT: Policy = Policy {
    name: "payment",
    window: Duration::from_secs(60 * 60),
    max_requests: 5,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many payment attempts, please try again later.",
};

static MESSAGE: Policy = Policy {
    name: "message",
    window: Duration::from_secs(60),
    max_requests: 30,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many messages sent, please slow down.",
};

static FILE_UPLOAD: Policy = Policy {
    name: "file_upload",
    window: Duration::from_secs(60 * 60),
    max_requests: 10,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many file uploads, please try again later.",
};

static WS_MESSAGE: Policy = Policy {
    name: "ws_message",
    window: Duration::from_secs(60),
    max_requests: 60,
    key_strategy: KeyStrategy::IpOnly,
    skip_successful: false,
    skip_failed: true,
    message: "Message rate limit exceeded, please slow down.",
};

static SEARCH: Policy = Policy {
    name: "search",
    window: Duration::from_secs(60),
    max_requests: 30,
    key_strategy: KeyStrategy::UserOrIp,
    skip_successful: false,
    skip_failed: false,
    message: "Too many search requests, please slow down.",
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_policy_table_values() {
        let general = PolicyKind::General.policy();
        assert_eq!(general.window, Duration::from_secs(900));
        assert_eq!(general.max_requests, 100);
        assert_eq!(general.key_strategy, KeyStrategy::UserOrIp);

        let auth = PolicyKind::Auth.policy();
        assert_eq!(auth.window, Duration::from_secs(60));
        assert_eq!(auth.max_requests, 5);
        assert_eq!(auth.key_strategy, KeyStrategy::IpOnly);
        assert!(auth.skip_successful);
        assert!(!auth.skip_failed);

        let reset = PolicyKind::PasswordReset.policy();
        assert_eq!(reset.window, Duration::from_secs(3600));
        assert_eq!(reset.max_requests, 3);
        assert_eq!(reset.key_strategy, KeyStrategy::IpOnly);

        let tasks = PolicyKind::TaskCreation.policy();
        assert_eq!(tasks.window, Duration::from_secs(3600));
        assert_eq!(tasks.max_requests, 10);

        let proposals = PolicyKind::Proposal.policy();
        assert_eq!(proposals.max_requests, 20);

        let payments = PolicyKind::Payment.policy();
        assert_eq!(payments.window, Duration::from_secs(3600));
        assert_eq!(payments.max_requests, 5);

        let messages = PolicyKind::Message.policy();
        assert_eq!(messages.window, Duration::from_secs(60));
        assert_eq!(messages.max_requests, 30);

        let uploads = PolicyKind::FileUpload.policy();
        assert_eq!(uploads.max_requests, 10);

        let ws = PolicyKind::WsMessage.policy();
        assert_eq!(ws.window, Duration::from_secs(60));
        assert_eq!(ws.max_requests, 60);
        assert_eq!(ws.key_strategy, KeyStrategy::IpOnly);
        assert!(ws.skip_failed);
        assert!(!ws.skip_successful);

        let search = PolicyKind::Search.policy();
        assert_eq!(search.max_requests, 30);
    }

    #[test]
    fn test_policy_names_are_unique() {
        let names: HashSet<&str> = PolicyKind::ALL.iter().map(|k| k.policy().name).collect();
        assert_eq!(names.len(), PolicyKind::ALL.len());
    }

    #[test]
    fn test_storage_keys_never_collide_across_policies() {
        // Same requester under every policy must map to distinct keys
        let keys: HashSet<String> = PolicyKind::ALL
            .iter()
            .map(|k| k.policy().storage_key("ip:1.2.3.4"))
            .collect();
        assert_eq!(keys.len(), PolicyKind::ALL.len());
    }

    #[test]
    fn test_storage_key_format() {
        let auth = PolicyKind::Auth.policy();
        assert_eq!(auth.storage_key("ip:1.2.3.4"), "rate_limit:auth:ip:1.2.3.4");
    }
}
