//! Network time sync
//!
//! A boot-time sync that retries according to a [`SyncPolicy`], and a
//! [`ResyncCounter`] that schedules one best-effort attempt per period
//! of render ticks.

use embedded_hal::blocking::delay::DelayMs;
use heapless::String;

use crate::clock::{DateTime, ParseError, Rtc};

/// Time as reported by the time API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePayload {
    /// `YYYY-MM-DDTHH:MM:SS[.frac][offset]`
    pub datetime: String<48>,
    /// 0 = Sunday
    pub day_of_week: u8,
    pub day_of_year: u16,
    pub dst: bool,
}

/// Source of network time
pub trait TimeSource {
    type Error;

    /// Blocking fetch. Implementations bound their own wait.
    fn fetch_time(&mut self) -> Result<TimePayload, Self::Error>;
}

/// How hard the boot-time sync tries before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: u32,
    pub max_backoff_ms: u32,
}

impl SyncPolicy {
    /// Retry up to `max_attempts` times, doubling the pause after each
    /// failure up to `max_backoff_ms`
    pub const fn bounded(max_attempts: u32, initial_backoff_ms: u32, max_backoff_ms: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Retry back-to-back until an attempt succeeds
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}

/// Errors fetching and reading a time payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FetchError<S> {
    /// The time source failed to deliver a payload
    Transport(S),
    /// The payload's datetime could not be read
    Parse(ParseError),
}

/// Errors from a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError<S, R> {
    /// The time source failed to deliver a payload
    Transport(S),
    /// The payload's datetime could not be read
    Parse(ParseError),
    /// The RTC refused the new time
    Rtc(R),
    /// The retry budget ran out; the RTC keeps its current time
    Exhausted { attempts: u32 },
}

impl<S, R> From<FetchError<S>> for SyncError<S, R> {
    fn from(err: FetchError<S>) -> Self {
        match err {
            FetchError::Transport(err) => SyncError::Transport(err),
            FetchError::Parse(err) => SyncError::Parse(err),
        }
    }
}

/// Fetch and parse without touching the RTC
pub fn fetch_datetime<T: TimeSource>(source: &mut T) -> Result<DateTime, FetchError<T::Error>> {
    let payload = source.fetch_time().map_err(FetchError::Transport)?;
    DateTime::parse(&payload.datetime, payload.day_of_week).map_err(FetchError::Parse)
}

/// Fetch, parse and commit once
pub fn sync_once<T, R>(source: &mut T, rtc: &mut R) -> Result<DateTime, SyncError<T::Error, R::Error>>
where
    T: TimeSource,
    R: Rtc,
{
    let datetime = fetch_datetime(source)?;
    rtc.commit(&datetime).map_err(SyncError::Rtc)?;
    Ok(datetime)
}

/// Boot-time sync. Blocks until an attempt succeeds or the policy gives
/// up. An RTC failure ends the sync at once since retrying cannot help.
pub fn initial_sync<T, R, D>(
    source: &mut T,
    rtc: &mut R,
    delay: &mut D,
    policy: &SyncPolicy,
) -> Result<DateTime, SyncError<T::Error, R::Error>>
where
    T: TimeSource,
    R: Rtc,
    D: DelayMs<u32>,
{
    let mut attempts = 0u32;
    let mut backoff = policy.initial_backoff_ms;
    loop {
        attempts = attempts.saturating_add(1);
        match sync_once(source, rtc) {
            Ok(datetime) => {
                #[cfg(feature = "defmt")]
                defmt::info!("time synced after {} attempt(s): {}", attempts, datetime);
                return Ok(datetime);
            }
            Err(SyncError::Rtc(err)) => return Err(SyncError::Rtc(err)),
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("time sync attempt {} failed", attempts);
            }
        }

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(SyncError::Exhausted { attempts });
            }
        }
        if backoff > 0 {
            delay.delay_ms(backoff);
            backoff = backoff.saturating_mul(2).min(policy.max_backoff_ms);
        }
    }
}

/// One best-effort periodic attempt. Never retries and never touches
/// the RTC: the caller hands a good result to
/// [`RenderLoop::apply_resync`](crate::RenderLoop::apply_resync), so the
/// wait on the source happens outside the render tick.
pub fn try_resync<T: TimeSource>(source: &mut T) -> Result<DateTime, FetchError<T::Error>> {
    let result = fetch_datetime(source);
    #[cfg(feature = "defmt")]
    match &result {
        Ok(datetime) => defmt::info!("periodic resync fetched {}", datetime),
        Err(_) => defmt::warn!("periodic resync failed, keeping RTC time"),
    }
    result
}

/// Counts render ticks and fires once every `period` ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResyncCounter {
    period: u32,
    ticks: u32,
}

impl ResyncCounter {
    pub const fn new(period: u32) -> Self {
        Self { period, ticks: 0 }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Count one tick. Returns `true` when a resync is due.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.period {
            self.ticks = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Offline;

    struct Scripted {
        /// Fail this many times before answering
        failures: u32,
        calls: u32,
        datetime: &'static str,
    }

    impl TimeSource for Scripted {
        type Error = Offline;

        fn fetch_time(&mut self) -> Result<TimePayload, Offline> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(Offline);
            }
            let mut datetime = String::new();
            datetime.push_str(self.datetime).map_err(|_| Offline)?;
            Ok(TimePayload {
                datetime,
                day_of_week: 3,
                day_of_year: 203,
                dst: true,
            })
        }
    }

    #[derive(Default)]
    struct MemoryRtc {
        now: Option<DateTime>,
        commits: u32,
    }

    impl Rtc for MemoryRtc {
        type Error = ();

        fn read(&mut self) -> Result<DateTime, ()> {
            self.now.ok_or(())
        }

        fn commit(&mut self, datetime: &DateTime) -> Result<(), ()> {
            self.now = Some(*datetime);
            self.commits += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        pauses: heapless::Vec<u32, 16>,
    }

    impl DelayMs<u32> for RecordingDelay {
        fn delay_ms(&mut self, ms: u32) {
            let _ = self.pauses.push(ms);
        }
    }

    fn source(failures: u32) -> Scripted {
        Scripted {
            failures,
            calls: 0,
            datetime: "2024-07-24T08:15:30.5+02:00",
        }
    }

    #[test]
    fn test_initial_sync_commits_first_good_payload() {
        let mut src = source(0);
        let mut rtc = MemoryRtc::default();
        let mut delay = RecordingDelay::default();
        let dt = initial_sync(&mut src, &mut rtc, &mut delay, &SyncPolicy::bounded(3, 100, 1000))
            .unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (8, 15, 30));
        assert_eq!(dt.day_of_week, 3);
        assert_eq!(rtc.now, Some(dt));
        assert!(delay.pauses.is_empty());
    }

    #[test]
    fn test_initial_sync_backs_off_exponentially() {
        let mut src = source(4);
        let mut rtc = MemoryRtc::default();
        let mut delay = RecordingDelay::default();
        initial_sync(&mut src, &mut rtc, &mut delay, &SyncPolicy::bounded(10, 100, 500)).unwrap();
        assert_eq!(src.calls, 5);
        assert_eq!(delay.pauses.as_slice(), &[100, 200, 400, 500]);
        assert_eq!(rtc.commits, 1);
    }

    #[test]
    fn test_initial_sync_gives_up_and_keeps_rtc() {
        let mut src = source(u32::MAX);
        let mut rtc = MemoryRtc::default();
        let mut delay = RecordingDelay::default();
        let err = initial_sync(&mut src, &mut rtc, &mut delay, &SyncPolicy::bounded(3, 10, 10))
            .unwrap_err();
        assert_eq!(err, SyncError::Exhausted { attempts: 3 });
        assert_eq!(src.calls, 3);
        assert_eq!(delay.pauses.as_slice(), &[10, 10]);
        assert_eq!(rtc.commits, 0);
    }

    #[test]
    fn test_unbounded_policy_retries_without_pause() {
        let mut src = source(7);
        let mut rtc = MemoryRtc::default();
        let mut delay = RecordingDelay::default();
        initial_sync(&mut src, &mut rtc, &mut delay, &SyncPolicy::unbounded()).unwrap();
        assert_eq!(src.calls, 8);
        assert!(delay.pauses.is_empty());
    }

    #[test]
    fn test_malformed_payload_is_a_failed_attempt() {
        let mut src = Scripted {
            failures: 0,
            calls: 0,
            datetime: "2024-07-24 08:15:30",
        };
        assert_eq!(
            try_resync(&mut src),
            Err(FetchError::Parse(ParseError::MissingSeparator))
        );
    }

    #[test]
    fn test_resync_reports_transport_failure() {
        let mut src = source(1);
        assert_eq!(try_resync(&mut src), Err(FetchError::Transport(Offline)));
        assert_eq!(try_resync(&mut src).map(|dt| dt.minute), Ok(15));
    }

    #[test]
    fn test_sync_once_maps_parse_failure() {
        let mut src = Scripted {
            failures: 0,
            calls: 0,
            datetime: "2024-13-24T08:15:30",
        };
        let mut rtc = MemoryRtc::default();
        assert!(matches!(sync_once(&mut src, &mut rtc), Err(SyncError::Parse(_))));
        assert_eq!(rtc.commits, 0);
    }

    #[test]
    fn test_counter_fires_once_per_period() {
        let mut counter = ResyncCounter::new(85_000);
        let fired = (0..85_000 * 3).filter(|_| counter.tick()).count();
        assert_eq!(fired, 3);
        assert_eq!(counter.ticks(), 0);
    }

    #[test]
    fn test_counter_not_due_before_period() {
        let mut counter = ResyncCounter::new(85_000);
        for _ in 0..84_999 {
            assert!(!counter.tick());
        }
        assert!(counter.tick());
    }
}
