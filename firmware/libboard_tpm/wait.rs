use crate::clock::Clock;
use crate::error::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// How long an await step may spin before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Spin until the condition holds, however long that takes.
    Unbounded,
    /// Give up with `Error::TimedOut` once `timeout_ms` has elapsed.
    Bounded { timeout_ms: u64 }
}

impl Default for WaitPolicy {
    fn default() -> WaitPolicy {
        WaitPolicy::Bounded { timeout_ms: DEFAULT_TIMEOUT_MS }
    }
}

/// Poll `condition` until it returns `true`.
///
/// The condition is always evaluated at least once, so a zero timeout still
/// succeeds when the hardware is already in the expected state. Errors from
/// the condition abort the wait immediately.
pub fn poll_until<F>(clock: &dyn Clock, policy: WaitPolicy, what: &'static str,
                     mut condition: F) -> Result<(), Error>
    where F: FnMut() -> Result<bool, Error>
{
    let t = clock.get_ms();
    loop {
        if condition()? {
            return Ok(())
        }
        if let WaitPolicy::Bounded { timeout_ms } = policy {
            if clock.get_ms().saturating_sub(t) > timeout_ms {
                error!("timed out waiting for {}", what);
                return Err(Error::TimedOut { what: what, timeout_ms: timeout_ms })
            }
        }
    }
}
