use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimingScope {
    Retriever,
    Projection,
    Storage,
    Load,
    Function,
}

impl fmt::Display for TimingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retriever => "Retriever",
            Self::Projection => "Projection",
            Self::Storage => "Storage",
            Self::Load => "Load",
            Self::Function => "Function",
        };
        f.write_str(name)
    }
}

/// Time spent per scope over one execution. Scopes nest, so a parent's
/// total includes its children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTimings {
    totals: BTreeMap<TimingScope, Duration>,
    calls: BTreeMap<TimingScope, u64>,
}

impl QueryTimings {
    pub fn record(&mut self, scope: TimingScope, elapsed: Duration) {
        *self.totals.entry(scope).or_default() += elapsed;
        *self.calls.entry(scope).or_default() += 1;
    }

    pub fn total(&self, scope: TimingScope) -> Duration {
        self.totals.get(&scope).copied().unwrap_or_default()
    }

    pub fn calls(&self, scope: TimingScope) -> u64 {
        self.calls.get(&scope).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimingScope, Duration)> + '_ {
        self.totals.iter().map(|(scope, d)| (*scope, *d))
    }
}
