//! Auto-save policy.
//!
//! Decides when the working state should be flushed: after a quiet period
//! following the last change, or at the latest once the interval has passed
//! since the previous save. Manual saves and the timer share one flush, so
//! this type only tracks time and the dirty flag; writing is the project
//! manager's job.

use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Default quiet period after the last change, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Tracks unsaved changes and decides when to flush them.
#[derive(Debug, Clone)]
pub struct AutoSave {
    /// Upper bound between saves while changes keep coming.
    interval: Duration,
    /// Quiet period after the last change.
    debounce: Duration,
    /// Last save timestamp.
    last_save: Option<Instant>,
    /// Last change timestamp.
    last_change: Option<Instant>,
    /// Whether there are unsaved changes.
    dirty: bool,
    enabled: bool,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            last_save: None,
            last_change: None,
            dirty: false,
            enabled: true,
        }
    }
}

impl AutoSave {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Turn the timer off. Manual saves still work.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a change at `now`.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.last_change = Some(now);
    }

    /// Check if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a successful save at `now`.
    pub fn mark_saved(&mut self, now: Instant) {
        self.dirty = false;
        self.last_save = Some(now);
    }

    /// Forget pending changes without saving (the state was replaced).
    pub fn reset(&mut self, now: Instant) {
        self.dirty = false;
        self.last_change = None;
        self.last_save = Some(now);
    }

    pub fn last_save(&self) -> Option<Instant> {
        self.last_save
    }

    /// Whether the timer should flush at `now`.
    pub fn should_save(&self, now: Instant) -> bool {
        if !self.dirty || !self.enabled {
            return false;
        }
        let quiet = match self.last_change {
            Some(change) => now.saturating_duration_since(change) >= self.debounce,
            None => true,
        };
        let overdue = match self.last_save {
            Some(save) => now.saturating_duration_since(save) >= self.interval,
            None => false,
        };
        quiet || overdue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autosave_creation() {
        let autosave = AutoSave::new();
        assert!(!autosave.is_dirty());
        assert!(!autosave.should_save(Instant::now()));
        assert_eq!(autosave.debounce(), Duration::from_millis(1500));
        assert_eq!(autosave.interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_autosave_waits_for_quiet_period() {
        let start = Instant::now();
        let mut autosave = AutoSave::new();
        autosave.mark_dirty(start);
        assert!(!autosave.should_save(start + Duration::from_millis(500)));
        assert!(autosave.should_save(start + Duration::from_millis(1500)));
    }

    #[test]
    fn test_autosave_interval_caps_debounce() {
        let start = Instant::now();
        let mut autosave = AutoSave::new();
        autosave.mark_saved(start);

        // A change every second never leaves a quiet period
        let mut now = start;
        for _ in 0..29 {
            now += Duration::from_secs(1);
            autosave.mark_dirty(now);
            assert!(!autosave.should_save(now));
        }
        now += Duration::from_secs(1);
        autosave.mark_dirty(now);
        assert!(autosave.should_save(now));
    }

    #[test]
    fn test_autosave_save_clears_dirty() {
        let start = Instant::now();
        let mut autosave = AutoSave::new();
        autosave.mark_dirty(start);
        autosave.mark_saved(start + Duration::from_secs(2));
        assert!(!autosave.is_dirty());
        assert!(!autosave.should_save(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_autosave_disabled() {
        let start = Instant::now();
        let mut autosave = AutoSave::new();
        autosave.set_enabled(false);
        autosave.mark_dirty(start);
        assert!(!autosave.should_save(start + Duration::from_secs(60)));
        assert!(autosave.is_dirty());
    }
}
