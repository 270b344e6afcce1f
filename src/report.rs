use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use {serde::Serialize, std::borrow::Cow, tabled::Tabled};

/// Per-agent summary of an allocation
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    pub agent: usize,
    pub utility: f64,
    pub threshold: f64,
    /// Items with a non-negligible share
    pub bundle: Vec<usize>,
    pub satisfied: bool,
}

impl AgentReport {
    const SATISFACTION_EPS: f64 = 1e-6;

    pub fn new(agent: usize, utility: f64, threshold: f64, bundle: Vec<usize>) -> Self {
        let satisfied = utility >= threshold - Self::SATISFACTION_EPS * threshold.abs().max(1.0);
        Self {
            agent,
            utility,
            threshold,
            bundle,
            satisfied,
        }
    }

    fn bundle_label(&self) -> String {
        let items: Vec<String> = self.bundle.iter().map(|i| i.to_string()).collect();
        format!("{{{}}}", items.join(", "))
    }
}

impl Display for AgentReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "agent {}: utility {:.4} (threshold {:.4}) items {}",
            self.agent,
            self.utility,
            self.threshold,
            self.bundle_label()
        )
    }
}

#[cfg(feature = "serde")]
impl Tabled for AgentReport {
    const LENGTH: usize = 5;

    fn fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(self.agent.to_string()),
            Cow::Owned(format!("{:.4}", self.utility)),
            Cow::Owned(format!("{:.4}", self.threshold)),
            Cow::Owned(self.bundle_label()),
            Cow::Borrowed(if self.satisfied { "yes" } else { "no" }),
        ]
    }

    fn headers() -> Vec<Cow<'static, str>> {
        ["agent", "utility", "threshold", "bundle", "satisfied"]
            .into_iter()
            .map(Cow::Borrowed)
            .collect()
    }
}
