use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};

/// Time source for the processing date and fallback-file suffixes.
pub trait Clock: Send + Sync {
    /// Current processing date (UTC).
    fn today(&self) -> NaiveDate;

    /// Current Unix time in whole seconds.
    fn epoch_secs(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn epoch_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Часы, которые двигаются только вручную.
#[derive(Debug)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn at(epoch_secs: i64) -> Self {
        Self { secs: AtomicI64::new(epoch_secs) }
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        DateTime::from_timestamp(self.epoch_secs(), 0)
            .unwrap_or_default()
            .date_naive()
    }

    fn epoch_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}
