use super::session::Session;
use crate::auth;
use crate::config::Credential;
use crate::error::{EnclaveError, Result};
use crate::types::{parse_frame, LoginArgs, OutboundFrame};
use log::*;
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};

/// Builds the `login` frame for the given timestamp.
pub fn login_frame(credential: &Credential, unix_ms: u64) -> Result<OutboundFrame> {
    let sign = auth::login_signature(credential.secret(), unix_ms)?;
    Ok(OutboundFrame::Login {
        args: LoginArgs {
            key: credential.key().to_string(),
            time: unix_ms.to_string(),
            sign,
        },
    })
}

/// Logs in on a freshly opened session and waits for exactly one reply.
///
/// Anything other than `{"type":"loggedIn"}`, or no reply within `reply_timeout`, is an
/// [`EnclaveError::AuthenticationError`]. A transport closure during the exchange surfaces
/// as [`EnclaveError::ConnectionClosed`] so the caller can reconnect instead.
pub async fn login(
    session: &Session,
    credential: &Credential,
    reply_timeout: Duration,
) -> Result<()> {
    let frame = login_frame(credential, auth::get_timestamp_ms())?;
    info!("[Auth] Logging in with key {}", credential.key());
    session.send(&frame.to_text()?).await?;

    let reply = match timeout(reply_timeout, session.receive()).await {
        Ok(reply) => reply?,
        Err(_) => {
            return Err(EnclaveError::AuthenticationError(format!(
                "No login reply within {:?}",
                reply_timeout
            )))
        }
    };
    check_login_reply(&reply)
}

fn check_login_reply(reply: &str) -> Result<()> {
    let accepted = parse_frame(reply)
        .map(|value: Value| value == json!({"type": "loggedIn"}))
        .unwrap_or(false);
    if accepted {
        debug!("[Auth] Login accepted.");
        Ok(())
    } else {
        Err(EnclaveError::AuthenticationError(format!(
            "Login failed, server replied: {}",
            reply
        )))
    }
}
