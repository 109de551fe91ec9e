//! Temporary signing authorization for the deployment account.
//!
//! Whether to unlock is an explicit policy resolved once at startup, driven
//! by the `ACCOUNT_PASSWORD` environment variable: present means unlock the
//! profile's account on the node before deploying, absent means the account
//! is assumed already unlocked (or signed for locally) and the unlock step
//! is skipped. Skipping is logged so operators can tell the two apart.
//!
//! The unlock side effect lives in the node's own memory. Two concurrent
//! runs against the same account and node must serialize their unlock
//! windows; a later unlock shortens the window the earlier run assumed.
//! The window must cover the full duration of the deployment steps it was
//! issued for.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::network::NetworkProfile;
use crate::rpc::RpcClient;

/// Environment variable that supplies the unlock secret.
pub const ACCOUNT_PASSWORD_ENV: &str = "ACCOUNT_PASSWORD";

/// An unlock secret. Never logged, serialized, or printed.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Access the raw secret. Only the unlock RPC call needs this.
    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Whether and how to authorize the deployment account before a run.
///
/// Resolved once at startup, not checked ad hoc per call.
#[derive(Debug, Clone)]
pub enum AuthorizationPolicy {
    /// Do not unlock; the account is already unlocked or uses a local
    /// signer.
    Skip,
    /// Unlock the profile's account on the node for `duration` using
    /// `secret`.
    UnlockWithSecret { secret: Secret, duration: Duration },
}

impl AuthorizationPolicy {
    /// Resolve the policy from [`ACCOUNT_PASSWORD_ENV`].
    ///
    /// The unlock duration is a required, explicit parameter; the window
    /// must cover the whole deployment run.
    pub fn from_env(duration: Duration) -> Self {
        Self::from_env_var(ACCOUNT_PASSWORD_ENV, duration)
    }

    fn from_env_var(var: &str, duration: Duration) -> Self {
        match std::env::var(var) {
            Ok(secret) if !secret.is_empty() => Self::UnlockWithSecret {
                secret: Secret::new(secret),
                duration,
            },
            _ => Self::Skip,
        }
    }

    /// The unlock window, if this policy performs an unlock.
    pub fn unlock_duration(&self) -> Option<Duration> {
        match self {
            Self::Skip => None,
            Self::UnlockWithSecret { duration, .. } => Some(*duration),
        }
    }
}

/// Apply the authorization policy to the profile's account.
///
/// Returns whether an unlock was performed. `Skip` performs no RPC call at
/// all; `UnlockWithSecret` calls `personal_unlockAccount` on the node and
/// fails with [`Error::Authentication`] if the node rejects the secret, or
/// [`Error::Network`] if the node is unreachable.
pub async fn unlock_if_required(
    rpc: &RpcClient,
    profile: &NetworkProfile,
    policy: &AuthorizationPolicy,
) -> Result<bool> {
    match policy {
        AuthorizationPolicy::Skip => {
            tracing::info!(
                account = %profile.from_address,
                network = %profile.name,
                "No unlock secret configured, skipping account unlock"
            );
            Ok(false)
        }
        AuthorizationPolicy::UnlockWithSecret { secret, duration } => {
            tracing::info!(
                account = %profile.from_address,
                network = %profile.name,
                duration_secs = duration.as_secs(),
                "Unlocking account on node..."
            );

            let unlocked: bool = rpc
                .call(
                    "personal_unlockAccount",
                    vec![
                        serde_json::json!(profile.from_address),
                        serde_json::json!(secret.expose()),
                        serde_json::json!(duration.as_secs()),
                    ],
                )
                .await?;

            if !unlocked {
                return Err(Error::Authentication(format!(
                    "node declined to unlock account {}",
                    profile.from_address
                )));
            }

            tracing::info!(account = %profile.from_address, "Account unlocked");
            Ok(true)
        }
    }
}
