use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_INGRESS_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Maximum clock skew tolerated between the agent and the replicas.
const DEFAULT_PERMITTED_DRIFT: Duration = Duration::from_secs(60);

/// Maximum time to wait for a result (successful or otherwise) of an
/// update call.
const INGRESS_TIMEOUT: Duration = Duration::from_secs(60 * 6);

/// Maximum time to wait for a single HTTP request.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);
const POLL_INTERVAL_MULTIPLIER: f64 = 1.2;
const POLL_INTERVAL_RANDOMIZATION: f64 = 0.1;

const NANOS_PER_MINUTE: u128 = 60 * 1_000_000_000;

/// The configuration of an [`Agent`](crate::Agent).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// How long a request stays valid after it was signed.
    pub ingress_expiry_seconds: u64,
    /// Subtracted from the ingress expiry to account for clock skew.
    pub permitted_drift_seconds: u64,
    /// Whether node signatures on query responses are checked.
    pub verify_query_signatures: bool,
    /// How long to poll for the outcome of an update call. This is
    /// independent from the expiry sent as part of the request.
    pub ingress_timeout_seconds: u64,
    pub min_poll_interval_millis: u64,
    pub max_poll_interval_millis: u64,
    pub poll_interval_multiplier: f64,
    /// Responses larger than this are dropped by the HTTP transport.
    pub max_response_body_size_bytes: Option<usize>,
    pub http_request_timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ingress_expiry_seconds: DEFAULT_INGRESS_EXPIRY.as_secs(),
            permitted_drift_seconds: DEFAULT_PERMITTED_DRIFT.as_secs(),
            verify_query_signatures: true,
            ingress_timeout_seconds: INGRESS_TIMEOUT.as_secs(),
            min_poll_interval_millis: MIN_POLL_INTERVAL.as_millis() as u64,
            max_poll_interval_millis: MAX_POLL_INTERVAL.as_millis() as u64,
            poll_interval_multiplier: POLL_INTERVAL_MULTIPLIER,
            max_response_body_size_bytes: None,
            http_request_timeout_seconds: HTTP_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl AgentConfig {
    pub fn ingress_expiry(&self) -> Duration {
        Duration::from_secs(self.ingress_expiry_seconds)
    }

    pub fn permitted_drift(&self) -> Duration {
        Duration::from_secs(self.permitted_drift_seconds)
    }

    pub fn ingress_timeout(&self) -> Duration {
        Duration::from_secs(self.ingress_timeout_seconds)
    }

    pub fn http_request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_request_timeout_seconds)
    }

    /// The polling policy for update calls.
    pub fn backoff_policy(&self) -> ExponentialBackoff {
        let min_interval = Duration::from_millis(self.min_poll_interval_millis);
        ExponentialBackoff {
            initial_interval: min_interval,
            current_interval: min_interval,
            randomization_factor: POLL_INTERVAL_RANDOMIZATION,
            multiplier: self.poll_interval_multiplier,
            start_time: std::time::Instant::now(),
            max_interval: Duration::from_millis(self.max_poll_interval_millis),
            max_elapsed_time: None,
            clock: backoff::SystemClock::default(),
        }
    }

    /// The expiry to put into a request signed now, in nanoseconds since the
    /// UNIX epoch.
    pub fn ingress_expiry_from_now(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        ingress_expiry_at(now, self.ingress_expiry(), self.permitted_drift())
    }
}

/// The expiry of a request signed at `now` (since the UNIX epoch), in
/// nanoseconds since the UNIX epoch.
///
/// Expiries more than a minute ahead are rounded down to a whole minute so
/// that requests signed within the same minute share their expiry.
pub fn ingress_expiry_at(now: Duration, ingress_expiry: Duration, permitted_drift: Duration) -> u64 {
    let validity = ingress_expiry.saturating_sub(permitted_drift);
    let expiry = now.saturating_add(validity).as_nanos();
    let expiry = if validity > Duration::from_secs(60) {
        expiry / NANOS_PER_MINUTE * NANOS_PER_MINUTE
    } else {
        expiry
    };
    u64::try_from(expiry).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::backoff::Backoff;

    #[test]
    fn should_have_sane_defaults() {
        let config = AgentConfig::default();

        assert_eq!(config.ingress_expiry(), Duration::from_secs(300));
        assert_eq!(config.permitted_drift(), Duration::from_secs(60));
        assert_eq!(config.ingress_timeout(), Duration::from_secs(360));
        assert!(config.verify_query_signatures);
        assert_eq!(config.max_response_body_size_bytes, None);
    }

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        let config: AgentConfig = serde_cbor::from_slice(
            &serde_cbor::to_vec(&serde_cbor::Value::Map(
                [(
                    serde_cbor::Value::Text("verify_query_signatures".to_string()),
                    serde_cbor::Value::Bool(false),
                )]
                .into_iter()
                .collect(),
            ))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(
            config,
            AgentConfig {
                verify_query_signatures: false,
                ..AgentConfig::default()
            }
        );
    }

    #[test]
    fn should_round_expiry_down_to_the_minute() {
        let now = Duration::from_nanos(1_685_570_412_345_678_901);

        let expiry = ingress_expiry_at(now, Duration::from_secs(300), Duration::from_secs(60));

        assert_eq!(expiry % 60_000_000_000, 0);
        assert_eq!(expiry, 1_685_570_640_000_000_000);
    }

    #[test]
    fn should_not_round_short_expiry() {
        let now = Duration::from_nanos(1_685_570_412_345_678_901);

        let expiry = ingress_expiry_at(now, Duration::from_secs(90), Duration::from_secs(60));

        assert_eq!(expiry, 1_685_570_442_345_678_901);
    }

    #[test]
    fn should_grow_poll_interval_up_to_max() {
        let config = AgentConfig {
            min_poll_interval_millis: 100,
            max_poll_interval_millis: 150,
            poll_interval_multiplier: 2.0,
            ..AgentConfig::default()
        };
        let mut policy = config.backoff_policy();

        let first = policy.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(90) && first <= Duration::from_millis(110));
        for _ in 0..10 {
            let next = policy.next_backoff().unwrap();
            assert!(next <= Duration::from_millis(165));
        }
    }
}
