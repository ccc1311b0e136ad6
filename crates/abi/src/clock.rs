use chrono::Utc;
use impl_tools::autoimpl;

/// Source of the current time for implicit `time` header values.
///
/// Injected wherever defaults are computed so that tests can pin time.
#[autoimpl(for<C: trait + ?Sized> &C, Box<C>)]
pub trait Clock {
    /// Current unix time, in milliseconds
    fn now_ms(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis() as u64
    }
}

/// Pinned clock for deterministic tests.
#[cfg(test)]
pub(crate) struct ConstClock(pub u64);

#[cfg(test)]
impl Clock for ConstClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}
