//! Capability probing, built entirely on the client's `version`
//! command.

use bser::Value;

use crate::client::Client;

/// Whether the daemon advertises `capability`.
///
/// Sends `version` with no optional capabilities and `capability` as
/// the single required one, then tests the boolean under the reply's
/// `"capabilities"` map. Any failure to obtain or parse a reply means
/// "absent"; this never surfaces an error.
pub async fn check_capability(client: &Client, capability: &str) -> bool {
    let reply = match client.version_with_capabilities(&[], &[capability]).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!(%capability, %e, "capability probe failed");
            return false;
        }
    };
    reply
        .get("capabilities")
        .and_then(|caps| caps.get(capability))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
