use std::collections::VecDeque;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use log::{info, warn};
use tokio::time::{sleep, Instant};

use crate::config::RateLimitConfig;
use crate::error::{ReviewBuilderError, Result};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window plus a per-calendar-day counter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: VecDeque<Instant>,
    day: NaiveDate,
    daily_count: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: VecDeque::new(),
            day: Local::now().date_naive(),
            daily_count: 0,
        }
    }

    pub fn daily_count(&self) -> u32 {
        self.daily_count
    }

    pub fn requests_in_window(&self) -> usize {
        self.window.len()
    }

    /// Waits until a request may be sent.
    ///
    /// Fails immediately with [`ReviewBuilderError::DailyLimitReached`] once the
    /// day's cap is used up. Otherwise blocks while the last minute already
    /// holds `max_requests_per_minute` requests.
    pub async fn check_limit(&mut self) -> Result<()> {
        self.check_limit_on(Local::now().date_naive()).await
    }

    pub(crate) async fn check_limit_on(&mut self, today: NaiveDate) -> Result<()> {
        if today != self.day {
            info!("New day {}, resetting daily request counter", today);
            self.day = today;
            self.daily_count = 0;
        }

        if self.daily_count >= self.config.max_requests_per_day {
            return Err(ReviewBuilderError::DailyLimitReached {
                limit: self.config.max_requests_per_day,
            });
        }

        let max_rpm = self.config.max_requests_per_minute;
        if max_rpm == 0 {
            return Ok(());
        }

        loop {
            let now = Instant::now();
            self.prune(now);
            if self.window.len() < max_rpm {
                return Ok(());
            }

            let Some(&oldest) = self.window.front() else {
                return Ok(());
            };
            let wait = (oldest + WINDOW).saturating_duration_since(now);
            warn!(
                "Per-minute limit of {} reached, waiting {:.1}s",
                max_rpm,
                wait.as_secs_f64()
            );
            sleep(wait).await;
        }
    }

    /// Call exactly once per outbound request, right before sending it.
    pub fn record_request(&mut self) {
        self.window.push_back(Instant::now());
        self.daily_count += 1;
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.window.front() {
            if now.saturating_duration_since(front) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}
