use mockall::automock;
use time::OffsetDateTime;

pub type Timestamp = OffsetDateTime;

#[automock]
pub trait Clock: Sync + Send + 'static {
    fn now(&self) -> Timestamp;
}

/// A clock reading the system time, always in UTC
#[derive(Clone)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcOffset;

    #[test]
    fn wall_clock_is_utc() {
        assert_eq!(WallClock.now().offset(), UtcOffset::UTC);
    }

    #[test]
    fn mock_clock_returns_the_given_time() {
        let frozen = OffsetDateTime::from_unix_timestamp(1_609_459_200).unwrap();
        let mut clock = MockClock::new();
        clock.expect_now().return_const(frozen);

        assert_eq!(clock.now(), frozen);
    }
}
