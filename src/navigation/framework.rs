use crate::event::{DomSnapshot, NavigationSignal, SignalSource};

/// A framework-specific navigation detection strategy. Strategies are
/// stateless pattern matchers over the DOM summary shipped with each
/// mutation burst; they assert a navigation when their framework's root
/// marker is present and the burst carried a fresh route announcement.
pub trait FrameworkStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_detect(&self, dom: &DomSnapshot) -> Option<NavigationSignal>;
}

fn marker_detect(dom: &DomSnapshot, markers: &[&str]) -> Option<NavigationSignal> {
    dom.route_announcement.as_ref()?;
    let marked = dom.markers.iter().any(|m| markers.contains(&m.as_str()));
    marked.then(|| NavigationSignal {
        source: SignalSource::Framework,
        observed_url: dom.url.clone(),
        observed_at_ms: 0.0,
    })
}

pub struct ReactRouterStrategy;

impl FrameworkStrategy for ReactRouterStrategy {
    fn name(&self) -> &'static str {
        "react-router"
    }

    fn try_detect(&self, dom: &DomSnapshot) -> Option<NavigationSignal> {
        marker_detect(dom, &["data-reactroot", "__next"])
    }
}

pub struct VueRouterStrategy;

impl FrameworkStrategy for VueRouterStrategy {
    fn name(&self) -> &'static str {
        "vue-router"
    }

    fn try_detect(&self, dom: &DomSnapshot) -> Option<NavigationSignal> {
        marker_detect(dom, &["__vue_app__", "data-v-app"])
    }
}

pub struct AngularRouterStrategy;

impl FrameworkStrategy for AngularRouterStrategy {
    fn name(&self) -> &'static str {
        "angular-router"
    }

    fn try_detect(&self, dom: &DomSnapshot) -> Option<NavigationSignal> {
        marker_detect(dom, &["ng-version"])
    }
}

/// Pluggable registry of detection strategies. Strategies can be added or
/// removed without touching the navigation state machine.
pub struct FrameworkRegistry {
    strategies: Vec<Box<dyn FrameworkStrategy>>,
}

impl Default for FrameworkRegistry {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(ReactRouterStrategy),
                Box::new(VueRouterStrategy),
                Box::new(AngularRouterStrategy),
            ],
        }
    }
}

impl FrameworkRegistry {
    pub fn empty() -> Self {
        Self { strategies: Vec::new() }
    }

    pub fn register(&mut self, strategy: Box<dyn FrameworkStrategy>) {
        self.strategies.push(strategy);
    }

    /// Run every strategy against one DOM summary, stamping results with the
    /// burst's observation time.
    pub fn detect(&self, dom: &DomSnapshot, at_ms: f64) -> Vec<NavigationSignal> {
        self.strategies
            .iter()
            .filter_map(|s| {
                s.try_detect(dom).map(|mut signal| {
                    signal.observed_at_ms = at_ms;
                    log::debug!("{} asserted navigation to {}", s.name(), signal.observed_url);
                    signal
                })
            })
            .collect()
    }
}
