//! Operator login.

use anyhow::Context;
use common::{CachedSession, Clock, DutyStore, OperatorSession, SessionCache};
use realtime::{Error, Result, bad_request};
use tracing::{info, warn};

const INVALID_CREDENTIALS: &str = "invalid operator id or password";

/// A successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub session: OperatorSession,
    pub token: String,
}

/// Check an operator's credentials and cache the resulting session on the
/// device.
///
/// # Errors
///
/// Returns `BadRequest` when either credential is empty, `Unauthorized` when
/// the operator is unknown or the password does not match, and
/// `Unavailable` when storage cannot be reached.
pub async fn login<P>(provider: &P, operator_id: &str, password: &str) -> Result<Login>
where
    P: DutyStore + SessionCache + Clock,
{
    let operator_id = operator_id.trim();
    if operator_id.is_empty() || password.is_empty() {
        return Err(bad_request!("operator id and password are required"));
    }

    info!(operator_id = %operator_id, "attempting login");
    let record =
        provider.find_operator(operator_id).await.context("looking up operator")?;

    // same answer for unknown operator and wrong password
    let Some(record) = record.filter(|r| r.password == password) else {
        warn!(monotonic_counter.login_failures = 1, operator_id = %operator_id, "login rejected");
        return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    let session = record.session();
    let token = format!("operator_{operator_id}_{}", provider.now().timestamp_millis());

    let cached = CachedSession { session: session.clone(), token: token.clone() };
    provider.store_session(&cached).context("caching session")?;

    info!(operator_id = %operator_id, on_duty = session.on_duty(), "login successful");
    Ok(Login { session, token })
}
