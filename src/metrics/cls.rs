use crate::event::LayoutShiftEntry;

/// Largest start-to-start gap between two shifts still grouped into one
/// session window.
pub const SESSION_GAP_MS: f64 = 1_000.0;
/// Maximum total span of one session window.
pub const SESSION_SPAN_MS: f64 = 5_000.0;

/// Accumulates cumulative layout shift for the current page-view epoch.
///
/// Qualifying shifts are grouped into session windows; the exposed score is
/// the maximum window total seen so far in the epoch, matching the windowed
/// CLS definition rather than a plain running sum.
#[derive(Debug)]
pub struct LayoutShiftAccumulator {
    supported: bool,
    best_window: f64,
    window_total: f64,
    window_start_ms: Option<f64>,
    last_shift_ms: Option<f64>,
}

impl Default for LayoutShiftAccumulator {
    fn default() -> Self {
        Self {
            supported: true,
            best_window: 0.0,
            window_total: 0.0,
            window_start_ms: None,
            last_shift_ms: None,
        }
    }
}

impl LayoutShiftAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shift-observation source is absent in this context; the score is
    /// reported as unavailable from here on, not as 0.
    pub fn mark_unsupported(&mut self) {
        self.supported = false;
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn record(&mut self, entry: &LayoutShiftEntry) {
        if !self.supported || entry.had_recent_input {
            return;
        }
        if !entry.value.is_finite() || entry.value < 0.0 || !entry.start_time_ms.is_finite() {
            log::debug!("ignoring unusable layout shift: {:?}", entry);
            return;
        }
        // Re-delivered entries share a start time; replays never advance the
        // window, so processing a burst twice cannot double-count.
        if let Some(prev) = self.last_shift_ms {
            if entry.start_time_ms <= prev {
                return;
            }
        }

        let extends = match (self.window_start_ms, self.last_shift_ms) {
            (Some(start), Some(prev)) => {
                entry.start_time_ms - prev < SESSION_GAP_MS
                    && entry.start_time_ms - start < SESSION_SPAN_MS
            }
            _ => false,
        };

        if extends {
            self.window_total += entry.value;
        } else {
            self.window_total = entry.value;
            self.window_start_ms = Some(entry.start_time_ms);
        }
        self.last_shift_ms = Some(entry.start_time_ms);

        if self.window_total > self.best_window {
            self.best_window = self.window_total;
        }
    }

    /// Cumulative score for the current epoch; `None` when shift observations
    /// are unavailable in this context.
    pub fn value(&self) -> Option<f64> {
        self.supported.then_some(self.best_window)
    }

    /// Zeroes all window state. Invoked exactly once per detected navigation.
    pub fn reset(&mut self) {
        self.best_window = 0.0;
        self.window_total = 0.0;
        self.window_start_ms = None;
        self.last_shift_ms = None;
    }
}
