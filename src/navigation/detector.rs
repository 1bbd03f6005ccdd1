use crate::event::{NavigationSignal, SignalSource, TransitionType};
use url::Url;

/// Emitted at most once per confirmed client-side navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOccurred {
    pub new_url: String,
    pub transition: TransitionType,
}

#[derive(Debug)]
enum State {
    Idle,
    /// One or more qualifying signals arrived; waiting out the debounce to
    /// coalesce whatever else belongs to the same logical navigation.
    Pending {
        first_at_ms: f64,
        deadline_ms: f64,
        candidate_url: String,
        framework_asserted: bool,
    },
}

/// Fuses history, poll, mutation and framework signals into a single
/// debounced navigation decision.
///
/// Confirmation requires the observed URL to differ from the current view's
/// URL, or an unconditional framework assertion; heavy DOM churn with an
/// unchanged URL resolves back to idle without emitting.
pub struct NavigationDetector {
    current_url: String,
    debounce_ms: f64,
    max_wait_ms: f64,
    state: State,
}

impl NavigationDetector {
    pub fn new(debounce_ms: f64, max_wait_ms: f64) -> Self {
        Self {
            current_url: String::new(),
            debounce_ms,
            max_wait_ms,
            state: State::Idle,
        }
    }

    /// Adopt the URL of a full document load. Browser-level loads bypass the
    /// state machine, so any pending confirmation is abandoned outright.
    pub fn set_current_url(&mut self, url: &str) {
        self.current_url = url.to_string();
        self.state = State::Idle;
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    /// Feed one signal. Returns whether it was treated as qualifying.
    pub fn observe(&mut self, signal: &NavigationSignal, now_ms: f64) -> bool {
        // A poll that still sees the current URL is the steady state, not a
        // navigation hint.
        if signal.source == SignalSource::Poll
            && same_url(&signal.observed_url, &self.current_url)
        {
            return false;
        }

        match &mut self.state {
            State::Idle => {
                log::debug!(
                    "navigation candidate from {:?}: {}",
                    signal.source,
                    signal.observed_url
                );
                self.state = State::Pending {
                    first_at_ms: now_ms,
                    deadline_ms: now_ms + self.debounce_ms,
                    candidate_url: signal.observed_url.clone(),
                    framework_asserted: signal.source == SignalSource::Framework,
                };
            }
            State::Pending {
                first_at_ms,
                deadline_ms,
                candidate_url,
                framework_asserted,
            } => {
                // Refresh the debounce, capped at a maximum total wait so a
                // signal storm cannot defer confirmation forever.
                *deadline_ms = (now_ms + self.debounce_ms).min(*first_at_ms + self.max_wait_ms);
                *candidate_url = signal.observed_url.clone();
                *framework_asserted |= signal.source == SignalSource::Framework;
            }
        }
        true
    }

    pub fn next_deadline(&self) -> Option<f64> {
        match &self.state {
            State::Pending { deadline_ms, .. } => Some(*deadline_ms),
            State::Idle => None,
        }
    }

    /// Resolve an expired confirmation wait. `None` means the churn was an
    /// in-place content update and the machine returned to idle silently.
    pub fn on_deadline(&mut self, now_ms: f64) -> Option<NavigationOccurred> {
        match &self.state {
            State::Pending { deadline_ms, .. } if now_ms >= *deadline_ms => {}
            _ => return None,
        }
        let State::Pending { candidate_url, framework_asserted, .. } =
            std::mem::replace(&mut self.state, State::Idle)
        else {
            return None;
        };

        if same_url(&candidate_url, &self.current_url) && !framework_asserted {
            log::debug!("discarding non-navigation churn at {}", candidate_url);
            return None;
        }
        self.current_url = candidate_url.clone();
        Some(NavigationOccurred {
            new_url: candidate_url,
            transition: TransitionType::Spa,
        })
    }
}

fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: f64 = 300.0;
    const MAX_WAIT: f64 = 1_500.0;

    fn detector() -> NavigationDetector {
        let mut d = NavigationDetector::new(DEBOUNCE, MAX_WAIT);
        d.set_current_url("https://app.test/home");
        d
    }

    fn signal(source: SignalSource, url: &str, at: f64) -> NavigationSignal {
        NavigationSignal {
            source,
            observed_url: url.to_string(),
            observed_at_ms: at,
        }
    }

    #[test]
    fn history_change_confirms_after_debounce() {
        let mut d = detector();
        assert!(d.observe(&signal(SignalSource::History, "https://app.test/profile", 10.0), 10.0));
        assert!(d.on_deadline(100.0).is_none(), "must wait out the debounce");

        let nav = d.on_deadline(10.0 + DEBOUNCE).unwrap();
        assert_eq!(nav.new_url, "https://app.test/profile");
        assert_eq!(nav.transition, TransitionType::Spa);
        assert_eq!(d.current_url(), "https://app.test/profile");
        assert!(!d.is_pending());
    }

    #[test]
    fn unchanged_url_churn_never_emits() {
        let mut d = detector();
        // Mutation-driven candidates pointing at the same URL, repeatedly.
        for i in 0..5 {
            d.observe(&signal(SignalSource::Mutation, "https://app.test/home", i as f64 * 40.0), i as f64 * 40.0);
        }
        assert!(d.on_deadline(5_000.0).is_none());
        assert!(!d.is_pending());
        assert_eq!(d.current_url(), "https://app.test/home");
    }

    #[test]
    fn near_simultaneous_signals_dedupe_to_one_event() {
        let mut d = detector();
        d.observe(&signal(SignalSource::History, "https://app.test/a", 0.0), 0.0);
        d.observe(&signal(SignalSource::Poll, "https://app.test/a", 50.0), 50.0);

        let nav = d.on_deadline(50.0 + DEBOUNCE).unwrap();
        assert_eq!(nav.new_url, "https://app.test/a");
        // Nothing left pending, and a late poll of the now-current URL is
        // not a qualifying input.
        assert!(d.on_deadline(10_000.0).is_none());
        assert!(!d.observe(&signal(SignalSource::Poll, "https://app.test/a", 900.0), 900.0));
    }

    #[test]
    fn framework_assertion_confirms_even_with_unchanged_url() {
        let mut d = detector();
        d.observe(&signal(SignalSource::Framework, "https://app.test/home", 0.0), 0.0);
        let nav = d.on_deadline(DEBOUNCE).unwrap();
        assert_eq!(nav.new_url, "https://app.test/home");
    }

    #[test]
    fn signal_storm_cannot_extend_past_max_wait() {
        let mut d = detector();
        let mut t = 0.0;
        while t < 3_000.0 {
            d.observe(&signal(SignalSource::Mutation, "https://app.test/b", t), t);
            t += 100.0;
        }
        // The deadline was capped at first_at + MAX_WAIT.
        assert_eq!(d.next_deadline(), Some(MAX_WAIT));
    }

    #[test]
    fn document_load_abandons_pending_confirmation() {
        let mut d = detector();
        d.observe(&signal(SignalSource::History, "https://app.test/x", 0.0), 0.0);
        d.set_current_url("https://other.test/landing");
        assert!(!d.is_pending());
        assert!(d.on_deadline(10_000.0).is_none());
    }
}
