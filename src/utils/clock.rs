use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, Utc};

/// Represents an entity responsible for providing dates across application. Every "now" used by
/// the store, the reconciler and the reminder scheduler goes through it, which lets tests pin the
/// wall clock and the local offset.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Same instant as [Clock::time] seen through the user's wall clock. Sleep windows are
    /// evaluated against this value.
    fn local_time(&self) -> DateTime<FixedOffset> {
        self.time().with_timezone(&Local).fixed_offset()
    }

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub mod test_clock {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tokio::time::Instant;

    use super::Clock;

    pub const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    /// Follows tokio's clock, so `start_paused` tests can warp time with `tokio::time::advance`.
    /// Local time is UTC to keep sleep window assertions independent from the host.
    #[derive(Clone)]
    pub struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    impl TestClock {
        pub fn starting_at(start_time: DateTime<Utc>) -> Self {
            Self {
                start_time,
                reference: Instant::now(),
            }
        }

        pub fn at_hour(hour: u32, minute: u32) -> Self {
            let start = TEST_START_DATE.date().and_hms_opt(hour, minute, 0).unwrap();
            Self::starting_at(Utc.from_utc_datetime(&start))
        }
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::starting_at(Utc.from_utc_datetime(&TEST_START_DATE))
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn local_time(&self) -> DateTime<FixedOffset> {
            self.time().fixed_offset()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }
}
