use embassy_time::{block_for, Duration, Instant};

pub struct Timer {
    expires_at: Instant,
}

#[derive(Debug, PartialEq)]
pub enum Error<E> {
    Timeout,
    Other(E),
}

impl Timer {
    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }

    /// Call `e` until it yields a result or `timeout` has passed.
    pub fn with_timeout<F, R, E>(timeout: Duration, mut e: F) -> Result<R, Error<E>>
    where
        F: FnMut() -> Option<Result<R, E>>,
    {
        let timer = Timer::after(timeout);

        loop {
            if let Some(res) = e() {
                return res.map_err(Error::Other);
            }
            if timer.is_expired() {
                return Err(Error::Timeout);
            }
        }
    }

    pub fn wait(self) {
        let now = Instant::now();
        if self.expires_at > now {
            block_for(self.expires_at - now);
        }
    }
}

/// Minimum quiet period before a new command may go out, counted from the
/// last response line or URC.
pub const MIN_COMMAND_INTERVAL: Duration = Duration::from_millis(20);

/// Paces command issuance so the modem is never addressed right on the heels
/// of its own output.
#[derive(Debug, Clone)]
pub struct Cooldown {
    interval: Duration,
    last_activity: Option<Instant>,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(MIN_COMMAND_INTERVAL)
    }
}

impl Cooldown {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_activity: None,
        }
    }

    /// Record modem output happening now.
    pub fn mark(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    pub fn remaining(&self) -> Duration {
        self.last_activity
            .and_then(|at| self.interval.checked_sub(at.elapsed()))
            .unwrap_or(Duration::from_ticks(0))
    }

    /// Block until the quiet period has passed. This is the only place the
    /// engine sleeps.
    pub fn wait(&self) {
        let remaining = self.remaining();
        if remaining > Duration::from_ticks(0) {
            trace!("Cooling down for {} ms", remaining.as_millis());
            block_for(remaining);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn with_timeout_times_out() {
        let start = Instant::now();
        let res: Result<(), Error<()>> = Timer::with_timeout(Duration::from_millis(50), || None);

        assert_eq!(res, Err(Error::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn with_timeout_returns_first_result() {
        let mut calls = 0;
        let res: Result<u32, Error<()>> = Timer::with_timeout(Duration::from_secs(1), || {
            calls += 1;
            (calls == 3).then_some(Ok(calls))
        });

        assert_eq!(res, Ok(3));
    }

    #[test]
    fn cooldown_without_activity_does_not_block() {
        let cooldown = Cooldown::default();
        assert_eq!(cooldown.remaining(), Duration::from_ticks(0));

        let start = Instant::now();
        cooldown.wait();
        assert!(start.elapsed() < MIN_COMMAND_INTERVAL);
    }

    #[test]
    fn cooldown_blocks_for_remaining_interval() {
        let mut cooldown = Cooldown::default();
        let start = Instant::now();
        cooldown.mark();
        assert!(cooldown.remaining() <= MIN_COMMAND_INTERVAL);

        cooldown.wait();
        assert!(start.elapsed() >= MIN_COMMAND_INTERVAL);
        assert_eq!(cooldown.remaining(), Duration::from_ticks(0));
    }

    #[test]
    fn cooldown_after_interval_passed() {
        let mut cooldown = Cooldown::new(Duration::from_millis(5));
        cooldown.mark();
        Timer::after(Duration::from_millis(10)).wait();

        assert_eq!(cooldown.remaining(), Duration::from_ticks(0));
    }
}
