use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSettings {
    /// Delay between consecutive successful posts.
    pub post_interval: Duration,
    /// Wait after a rate-limit error before retrying the same call.
    pub rate_limit_cooldown: Duration,
    /// Successful posts allowed before a long pause. `0` disables the budget.
    pub soft_budget: u32,
    pub budget_pause: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            post_interval: Duration::from_secs(15),
            rate_limit_cooldown: Duration::from_secs(300),
            soft_budget: 1500,
            budget_pause: Duration::from_secs(3600),
        }
    }
}

impl ThrottleSettings {
    /// No waiting at all; for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            post_interval: Duration::ZERO,
            rate_limit_cooldown: Duration::ZERO,
            soft_budget: 0,
            budget_pause: Duration::ZERO,
        }
    }
}

/// What to wait for after a successful post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Interval(Duration),
    Budget(Duration),
}

impl Pause {
    pub fn duration(self) -> Duration {
        match self {
            Pause::Interval(d) | Pause::Budget(d) => d,
        }
    }
}

/// Self-imposed pacing, local to one import run.
#[derive(Debug)]
pub struct Throttle {
    settings: ThrottleSettings,
    in_window: u32,
    total: u64,
}

impl Throttle {
    pub fn new(settings: ThrottleSettings) -> Self {
        Self {
            settings,
            in_window: 0,
            total: 0,
        }
    }

    pub fn settings(&self) -> &ThrottleSettings {
        &self.settings
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Count a successful post and decide how long to wait before the next one.
    pub fn record_post(&mut self) -> Pause {
        self.total += 1;
        self.in_window += 1;
        if self.settings.soft_budget > 0 && self.in_window >= self.settings.soft_budget {
            self.in_window = 0;
            return Pause::Budget(self.settings.budget_pause);
        }
        Pause::Interval(self.settings.post_interval)
    }
}
