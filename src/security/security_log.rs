use tracing::{error, info, warn};

/// Security-relevant operational events on the `security` tracing target.
///
/// These are ordinary log lines routed wherever the subscriber sends them.
/// Nothing is persisted or chained here; there is no audit trail.
/// Never pass plaintext, ciphertext or IVs to these methods.
#[derive(Debug, Clone, Default)]
pub struct SecurityLog;

impl SecurityLog {
    pub fn new() -> Self {
        Self
    }

    pub fn auth_success(&self, subject: &str, request_id: Option<&str>, action: &str) {
        info!(target: "security", event = "auth_success", subject, request_id = request_id.unwrap_or(""), action);
    }

    pub fn auth_failure(&self, request_id: Option<&str>, action: &str, reason: &str) {
        warn!(target: "security", event = "auth_failure", request_id = request_id.unwrap_or(""), action, reason);
    }

    pub fn scope_denied(&self, subject: &str, request_id: Option<&str>, action: &str, missing: &[String]) {
        warn!(target: "security", event = "scope_denied", subject, request_id = request_id.unwrap_or(""), action, missing = %missing.join(" "));
    }

    pub fn key_discovery_failed(&self, request_id: Option<&str>, reason: &str) {
        error!(target: "security", event = "key_discovery_failed", request_id = request_id.unwrap_or(""), reason);
    }

    pub fn secret_created(&self, subject: &str, secret_id: &str) {
        info!(target: "security", event = "secret_created", subject, secret_id);
    }

    pub fn secret_updated(&self, subject: &str, secret_id: &str, value_rotated: bool) {
        info!(target: "security", event = "secret_updated", subject, secret_id, value_rotated);
    }

    pub fn secret_deleted(&self, subject: &str, secret_id: &str) {
        info!(target: "security", event = "secret_deleted", subject, secret_id);
    }

    pub fn secret_decrypted(&self, subject: &str, secret_id: &str) {
        info!(target: "security", event = "secret_decrypted", subject, secret_id);
    }

    pub fn decryption_failed(&self, subject: &str, secret_id: &str, error_msg: &str) {
        error!(target: "security", event = "decryption_failed", subject, secret_id, error = error_msg);
    }
}
