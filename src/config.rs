use rand::Rng;
use std::time::Duration;

/// Address of the game-coordination server when none is given.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8765/";

/// Attempts made by one connect or reconnect cycle before giving up.
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubles on every further retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound for a single backoff delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Timeout for a single transport handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest inbound message accepted from the server (64 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Player count bounds the server enforces when a game is created.
pub const MIN_PLAYERS: u8 = 3;
pub const MAX_PLAYERS: u8 = 6;

/// Bounded exponential backoff used when (re)establishing the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Total attempts per cycle, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Try exactly once, never wait.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Un-jittered delay before retry number `retry` (0 = first retry).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub fn delay_for<R: Rng>(&self, retry: u32, rng: &mut R) -> Duration {
        let base = self.backoff(retry);
        if self.jitter && !base.is_zero() {
            base.mul_f64(rng.random_range(0.5..=1.0))
        } else {
            base
        }
    }
}

/// Settings for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    /// Treat the transport as dropped when nothing arrives for this long.
    pub idle_timeout: Option<Duration>,
    /// Inbound messages larger than this drop the connection.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            jitter: false,
        }
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let p = policy();
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(800));
        assert_eq!(p.backoff(4), Duration::from_secs(1));
        assert_eq!(p.backoff(40), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_and_full_delay() {
        let p = ReconnectPolicy { jitter: true, ..policy() };
        let mut rng = SmallRng::seed_from_u64(7);
        for retry in 0..8 {
            let base = p.backoff(retry);
            let d = p.delay_for(retry, &mut rng);
            let (d, base) = (d.as_secs_f64(), base.as_secs_f64());
            assert!(d <= base + 1e-6, "retry {retry}: {d} > {base}");
            assert!(d >= base * 0.5 - 1e-6, "retry {retry}: {d} < half of {base}");
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let p = ReconnectPolicy { max_attempts: 0, ..policy() };
        assert_eq!(p.attempts(), 1);
        assert_eq!(ReconnectPolicy::single_attempt().attempts(), 1);
    }
}
