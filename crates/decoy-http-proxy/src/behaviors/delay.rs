//! Delay behavior - configured latency before a response is sent.
//!
//! A response's own `fixedDelay` is added to at most one global rule. Fixed
//! rules are consulted first; log-normal rules only when no fixed rule applies.

use crate::metrics;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Metric label used when only the response's own delay applies.
pub const RESPONSE_DELAY_LABEL: &str = "response";

/// Global delay rule: requests whose destination matches the glob (and whose
/// method equals `method`, when set) are delayed by `delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DelayRuleView", into = "DelayRuleView")]
pub struct DelayRule {
    destination: glob::Pattern,
    method: Option<String>,
    delay: Duration,
}

impl DelayRule {
    pub fn new(
        destination: &str,
        method: Option<&str>,
        delay: Duration,
    ) -> Result<Self, glob::PatternError> {
        Ok(Self {
            destination: glob::Pattern::new(destination)?,
            method: method.filter(|m| !m.is_empty()).map(str::to_string),
            delay,
        })
    }

    pub fn destination(&self) -> &str {
        self.destination.as_str()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn applies_to(&self, destination: &str, method: &str) -> bool {
        self.destination.matches(destination) && self.method.as_deref().is_none_or(|m| m == method)
    }
}

impl PartialEq for DelayRule {
    fn eq(&self, other: &Self) -> bool {
        self.destination.as_str() == other.destination.as_str()
            && self.method == other.method
            && self.delay == other.delay
    }
}

/// Document form of a delay rule. `urlPattern` and `httpMethod` are legacy aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DelayRuleView {
    #[serde(alias = "urlPattern")]
    destination: String,
    #[serde(
        default,
        alias = "httpMethod",
        skip_serializing_if = "Option::is_none"
    )]
    method: Option<String>,
    delay: u64,
}

impl TryFrom<DelayRuleView> for DelayRule {
    type Error = String;

    fn try_from(view: DelayRuleView) -> Result<Self, Self::Error> {
        DelayRule::new(
            &view.destination,
            view.method.as_deref(),
            Duration::from_millis(view.delay),
        )
        .map_err(|e| format!("invalid delay destination '{}': {}", view.destination, e))
    }
}

impl From<DelayRule> for DelayRuleView {
    fn from(rule: DelayRule) -> Self {
        Self {
            destination: rule.destination.as_str().to_string(),
            method: rule.method,
            delay: rule.delay.as_millis() as u64,
        }
    }
}

/// Delay rule whose latency is drawn from a log-normal distribution with the
/// given mean and median, clamped to `[min, max]`. A `max` of zero means no
/// upper bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LogNormalDelayRuleView", into = "LogNormalDelayRuleView")]
pub struct LogNormalDelayRule {
    destination: glob::Pattern,
    method: Option<String>,
    bounds: LogNormalBounds,
}

/// Distribution parameters in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNormalBounds {
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: u64,
    pub mean: u64,
    pub median: u64,
}

impl LogNormalBounds {
    pub fn validate(&self) -> Result<(), String> {
        if self.mean == 0 || self.median == 0 {
            return Err("mean and median must be greater than 0".to_string());
        }
        if self.max != 0 {
            if self.max < self.min {
                return Err("min must not exceed max".to_string());
            }
            if self.mean > self.max || self.median > self.max {
                return Err("mean and median must not exceed max".to_string());
            }
        }
        if self.mean < self.min || self.median < self.min {
            return Err("mean and median must not be below min".to_string());
        }
        if self.median > self.mean {
            return Err("median must not exceed mean".to_string());
        }
        Ok(())
    }
}

impl LogNormalDelayRule {
    pub fn new(destination: &str, method: Option<&str>, bounds: LogNormalBounds) -> Result<Self, String> {
        let pattern = glob::Pattern::new(destination)
            .map_err(|e| format!("invalid delay destination '{}': {}", destination, e))?;
        bounds
            .validate()
            .map_err(|e| format!("invalid log-normal delay for '{}': {}", destination, e))?;
        Ok(Self {
            destination: pattern,
            method: method.filter(|m| !m.is_empty()).map(str::to_string),
            bounds,
        })
    }

    pub fn destination(&self) -> &str {
        self.destination.as_str()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn bounds(&self) -> LogNormalBounds {
        self.bounds
    }

    pub fn applies_to(&self, destination: &str, method: &str) -> bool {
        self.destination.matches(destination) && self.method.as_deref().is_none_or(|m| m == method)
    }

    /// Draw one delay.
    ///
    /// With `mean = exp(mu + sigma^2 / 2)` and `median = exp(mu)`, the
    /// parameters are `mu = ln(median)` and `sigma = sqrt(2 ln(mean / median))`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let LogNormalBounds { min, max, mean, median } = self.bounds;
        let mu = (median as f64).ln();
        let sigma = (2.0 * ((mean as f64).ln() - mu)).max(0.0).sqrt();

        // Box-Muller; `u1` is kept away from zero so the log is finite
        let u1 = 1.0 - rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();

        let mut ms = (mu + sigma * z).exp().round() as u64;
        ms = ms.max(min);
        if max != 0 {
            ms = ms.min(max);
        }
        Duration::from_millis(ms)
    }
}

impl PartialEq for LogNormalDelayRule {
    fn eq(&self, other: &Self) -> bool {
        self.destination.as_str() == other.destination.as_str()
            && self.method == other.method
            && self.bounds == other.bounds
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogNormalDelayRuleView {
    #[serde(alias = "urlPattern")]
    destination: String,
    #[serde(
        default,
        alias = "httpMethod",
        skip_serializing_if = "Option::is_none"
    )]
    method: Option<String>,
    #[serde(flatten)]
    bounds: LogNormalBounds,
}

impl TryFrom<LogNormalDelayRuleView> for LogNormalDelayRule {
    type Error = String;

    fn try_from(view: LogNormalDelayRuleView) -> Result<Self, Self::Error> {
        LogNormalDelayRule::new(&view.destination, view.method.as_deref(), view.bounds)
    }
}

impl From<LogNormalDelayRule> for LogNormalDelayRuleView {
    fn from(rule: LogNormalDelayRule) -> Self {
        Self {
            destination: rule.destination.as_str().to_string(),
            method: rule.method,
            bounds: rule.bounds,
        }
    }
}

/// A delay about to be injected and the rule pattern it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDelay {
    pub delay: Duration,
    pub rule: String,
}

/// First rule, in order, that applies to this destination and method.
pub fn delay_for(rules: &[DelayRule], destination: &str, method: &str) -> Option<Duration> {
    rules
        .iter()
        .find(|rule| rule.applies_to(destination, method))
        .map(|rule| rule.delay)
}

/// Combine the response's own delay with the first applicable global rule.
pub fn plan(
    fixed: &[DelayRule],
    log_normal: &[LogNormalDelayRule],
    destination: &str,
    method: &str,
    response_delay: Duration,
) -> Option<PlannedDelay> {
    let global = fixed
        .iter()
        .find(|rule| rule.applies_to(destination, method))
        .map(|rule| (rule.delay, rule.destination().to_string()))
        .or_else(|| {
            log_normal
                .iter()
                .find(|rule| rule.applies_to(destination, method))
                .map(|rule| (rule.sample(&mut rand::thread_rng()), rule.destination().to_string()))
        });

    match global {
        Some((delay, rule)) => Some(PlannedDelay {
            delay: delay + response_delay,
            rule,
        }),
        None if !response_delay.is_zero() => Some(PlannedDelay {
            delay: response_delay,
            rule: RESPONSE_DELAY_LABEL.to_string(),
        }),
        None => None,
    }
}

/// Sleep for the planned delay, if any.
pub async fn apply(
    fixed: &[DelayRule],
    log_normal: &[LogNormalDelayRule],
    destination: &str,
    method: &str,
    response_delay: Duration,
) {
    let Some(planned) = plan(fixed, log_normal, destination, method, response_delay) else {
        return;
    };
    if planned.delay.is_zero() {
        return;
    }
    let delay_ms = planned.delay.as_millis() as u64;
    debug!(destination, method, rule = %planned.rule, delay_ms, "Applying delay");
    metrics::record_delay(&planned.rule, delay_ms);
    tokio::time::sleep(planned.delay).await;
}
