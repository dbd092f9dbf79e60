//! Per-service usage records and their counters.

use crate::{Buckets, CallRecord, DayKey, HourKey, MonthKey, Tokens};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use palisade_error::ExceededLimit;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Call, success and error counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct CallCounts {
    /// Calls recorded
    calls: u64,
    /// Calls that succeeded
    success: u64,
    /// Calls that failed
    errors: u64,
}

impl CallCounts {
    fn tally(&mut self, success: bool) {
        self.calls += 1;
        if success {
            self.success += 1;
        } else {
            self.errors += 1;
        }
    }
}

/// Counters for one hour, broken down by endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct HourlyUsage {
    /// Totals for the hour
    #[serde(flatten)]
    counts: CallCounts,
    /// Totals per endpoint
    #[serde(default)]
    endpoints: BTreeMap<String, CallCounts>,
}

/// Counters and cost for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct DailyUsage {
    /// Totals for the day
    #[serde(flatten)]
    counts: CallCounts,
    /// Cost charged during the day
    #[serde(default)]
    cost: f64,
}

/// Counters, cost and tokens for one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct MonthlyUsage {
    /// Totals for the month
    #[serde(flatten)]
    counts: CallCounts,
    /// Cost charged during the month
    #[serde(default)]
    cost: f64,
    /// Tokens consumed during the month
    #[serde(default)]
    tokens: TokenUsage,
}

/// Accumulated token counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct TokenUsage {
    /// Prompt (input) tokens
    prompt: u64,
    /// Completion (output) tokens
    completion: u64,
    /// Total tokens
    total: u64,
}

impl TokenUsage {
    fn add(&mut self, tokens: &Tokens) {
        self.prompt = self.prompt.saturating_add(tokens.prompt().unwrap_or(0));
        self.completion = self
            .completion
            .saturating_add(tokens.completion().unwrap_or(0));
        self.total = self
            .total
            .saturating_add(tokens.effective_total().unwrap_or(0));
    }
}

/// Call-count limits; `None` means unlimited.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct Limits {
    /// Calls per UTC hour
    hourly: Option<u64>,
    /// Calls per UTC day
    daily: Option<u64>,
    /// Calls per UTC month
    monthly: Option<u64>,
    /// Calls since the record was created or cleared
    total: Option<u64>,
}

impl Limits {
    /// Limit of the given kind.
    pub fn get(&self, kind: LimitKind) -> Option<u64> {
        match kind {
            LimitKind::Hourly => self.hourly,
            LimitKind::Daily => self.daily,
            LimitKind::Monthly => self.monthly,
            LimitKind::Total => self.total,
        }
    }

    /// Set (or clear, with `None`) the limit of the given kind.
    pub fn set(&mut self, kind: LimitKind, value: Option<u64>) {
        match kind {
            LimitKind::Hourly => self.hourly = value,
            LimitKind::Daily => self.daily = value,
            LimitKind::Monthly => self.monthly = value,
            LimitKind::Total => self.total = value,
        }
    }
}

/// Which call-count limit to configure.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LimitKind {
    /// Calls per hour
    Hourly,
    /// Calls per day
    Daily,
    /// Calls per month
    Monthly,
    /// Calls overall
    Total,
}

impl From<LimitKind> for ExceededLimit {
    fn from(kind: LimitKind) -> Self {
        match kind {
            LimitKind::Hourly => ExceededLimit::Hourly,
            LimitKind::Daily => ExceededLimit::Daily,
            LimitKind::Monthly => ExceededLimit::Monthly,
            LimitKind::Total => ExceededLimit::Total,
        }
    }
}

/// Cost accounting for one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct Costs {
    /// Cost accumulated since the record was created or cleared
    total_cost: f64,
    /// Charged for calls recorded without an explicit cost
    cost_per_call: f64,
    /// Monthly spending ceiling; `None` means unlimited
    monthly_budget: Option<f64>,
}

impl Costs {
    pub(crate) fn set_cost_per_call(&mut self, cost_per_call: f64) {
        self.cost_per_call = cost_per_call;
    }

    pub(crate) fn set_monthly_budget(&mut self, monthly_budget: Option<f64>) {
        self.monthly_budget = monthly_budget;
    }
}

/// Details of the most recent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct LastCall {
    /// When the call was recorded
    time: DateTime<Utc>,
    /// Endpoint called
    endpoint: String,
    /// Whether it succeeded
    success: bool,
    /// Wall-clock duration in seconds
    duration_secs: Option<f64>,
    /// Caller-supplied metadata
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

/// Everything tracked for one service, persisted as `<service>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ServiceUsageRecord {
    /// Per-hour counters
    hourly_usage: Buckets<HourKey, HourlyUsage>,
    /// Per-day counters and cost
    daily_usage: Buckets<DayKey, DailyUsage>,
    /// Per-month counters, cost and tokens
    monthly_usage: Buckets<MonthKey, MonthlyUsage>,
    /// Call-count limits
    limits: Limits,
    /// Cost accounting
    costs: Costs,
    /// Calls since creation or last clear
    total_calls: u64,
    /// Successful calls
    success_count: u64,
    /// Failed calls
    error_count: u64,
    /// Tokens since creation or last clear
    total_tokens: TokenUsage,
    /// Time of the last change
    last_updated: DateTime<Utc>,
    /// Service name
    api_type: String,
    /// Most recent call
    #[serde(skip_serializing_if = "Option::is_none")]
    last_call: Option<LastCall>,
}

impl ServiceUsageRecord {
    /// Empty record for `service`.
    pub fn new(service: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            api_type: service.into(),
            last_updated: now,
            ..Self::default()
        }
    }

    /// Fold one call into every bucket and aggregate.
    ///
    /// Returns the cost actually charged: the explicit cost, or
    /// `cost_per_call` when none was given. An explicit cost that is negative
    /// or not finite is ignored in favor of `cost_per_call`.
    pub(crate) fn apply(&mut self, now: DateTime<Utc>, call: &CallRecord) -> f64 {
        let success = *call.success();

        let hourly = self.hourly_usage.entry(HourKey::from_datetime(now));
        hourly.counts.tally(success);
        hourly
            .endpoints
            .entry(call.endpoint().clone())
            .or_default()
            .tally(success);

        let daily = self.daily_usage.entry(DayKey::from_datetime(now));
        daily.counts.tally(success);

        let monthly = self.monthly_usage.entry(MonthKey::from_datetime(now));
        monthly.counts.tally(success);

        if let Some(tokens) = call.tokens() {
            self.total_tokens.add(tokens);
            monthly.tokens.add(tokens);
        }

        let cost = match *call.cost() {
            Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
            Some(cost) => {
                tracing::warn!(cost, "Ignoring invalid explicit call cost");
                self.costs.cost_per_call
            }
            None => self.costs.cost_per_call,
        };
        if cost > 0.0 {
            self.costs.total_cost += cost;
            daily.cost += cost;
            monthly.cost += cost;
        }

        self.total_calls += 1;
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.last_updated = now;
        self.last_call = Some(LastCall {
            time: now,
            endpoint: call.endpoint().clone(),
            success,
            duration_secs: call.duration().map(|d| d.as_secs_f64()),
            metadata: call.metadata().clone(),
        });

        cost.max(0.0)
    }

    /// The first limit at or above its threshold, checked hourly, daily,
    /// monthly, total, then monthly budget.
    pub fn exceeded_limit(&self, now: DateTime<Utc>) -> Option<ExceededLimit> {
        let at_or_over = |used: u64, limit: Option<u64>| limit.is_some_and(|limit| used >= limit);

        let hourly = self
            .hourly_usage
            .get(&HourKey::from_datetime(now))
            .map_or(0, |bucket| bucket.counts.calls);
        if at_or_over(hourly, self.limits.hourly) {
            return Some(ExceededLimit::Hourly);
        }

        let daily = self
            .daily_usage
            .get(&DayKey::from_datetime(now))
            .map_or(0, |bucket| bucket.counts.calls);
        if at_or_over(daily, self.limits.daily) {
            return Some(ExceededLimit::Daily);
        }

        let month = self.monthly_usage.get(&MonthKey::from_datetime(now));
        let monthly = month.map_or(0, |bucket| bucket.counts.calls);
        if at_or_over(monthly, self.limits.monthly) {
            return Some(ExceededLimit::Monthly);
        }

        if at_or_over(self.total_calls, self.limits.total) {
            return Some(ExceededLimit::Total);
        }

        let month_cost = month.map_or(0.0, |bucket| bucket.cost);
        if self
            .costs
            .monthly_budget
            .is_some_and(|budget| month_cost >= budget)
        {
            return Some(ExceededLimit::Budget);
        }

        None
    }

    /// Zero every counter and cost, keeping limits, `cost_per_call` and `monthly_budget`.
    pub(crate) fn reset(&mut self, now: DateTime<Utc>) {
        let mut fresh = Self::new(std::mem::take(&mut self.api_type), now);
        fresh.limits = self.limits;
        fresh.costs.cost_per_call = self.costs.cost_per_call;
        fresh.costs.monthly_budget = self.costs.monthly_budget;
        *self = fresh;
    }

    /// Drop hourly and daily buckets that started before `cutoff`.
    ///
    /// Returns the number of buckets removed.
    pub(crate) fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let hours = self.hourly_usage.retain(|key| key.start() >= cutoff);
        let days = self.daily_usage.retain(|key| key.start() >= cutoff);
        hours + days
    }

    pub(crate) fn limits_mut(&mut self) -> &mut Limits {
        &mut self.limits
    }

    pub(crate) fn costs_mut(&mut self) -> &mut Costs {
        &mut self.costs
    }
}
