//! Read-only usage summaries.

use crate::{DayKey, Limits, LastCall, MonthKey, ServiceUsageRecord, TokenUsage};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Calls and cost for the current day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct TodayStats {
    /// Calls today
    calls: u64,
    /// Cost today
    cost: f64,
}

/// Calls, cost and budget consumption for the current month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct MonthStats {
    /// Calls this month
    calls: u64,
    /// Cost this month
    cost: f64,
    /// Monthly budget, if set
    budget: Option<f64>,
    /// Share of the budget spent, 0 when unlimited
    budget_used_percent: f64,
}

/// Snapshot of one service's usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ServiceStats {
    /// Calls since creation or last clear
    total_calls: u64,
    /// Successful calls
    success_count: u64,
    /// Failed calls
    error_count: u64,
    /// Successful calls as a percentage
    success_rate: f64,
    /// Cost since creation or last clear
    total_cost: f64,
    /// Current UTC day
    today: TodayStats,
    /// Current UTC month
    this_month: MonthStats,
    /// Configured limits
    limits: Limits,
    /// Token totals
    tokens: TokenUsage,
    /// Time of the last change
    last_updated: DateTime<Utc>,
    /// Most recent call
    last_call: Option<LastCall>,
}

impl ServiceStats {
    /// Summarize `record` as of `now`.
    pub fn from_record(record: &ServiceUsageRecord, now: DateTime<Utc>) -> Self {
        let today = record
            .daily_usage()
            .get(&DayKey::from_datetime(now))
            .map(|day| TodayStats {
                calls: *day.counts().calls(),
                cost: *day.cost(),
            })
            .unwrap_or_default();

        let month = record.monthly_usage().get(&MonthKey::from_datetime(now));
        let month_calls = month.map_or(0, |m| *m.counts().calls());
        let month_cost = month.map_or(0.0, |m| *m.cost());
        let budget = *record.costs().monthly_budget();
        let budget_used_percent = match budget {
            Some(budget) if budget > 0.0 => month_cost / budget * 100.0,
            _ => 0.0,
        };

        Self {
            total_calls: *record.total_calls(),
            success_count: *record.success_count(),
            error_count: *record.error_count(),
            success_rate: rate(*record.success_count(), *record.total_calls()),
            total_cost: *record.costs().total_cost(),
            today,
            this_month: MonthStats {
                calls: month_calls,
                cost: month_cost,
                budget,
                budget_used_percent,
            },
            limits: *record.limits(),
            tokens: *record.total_tokens(),
            last_updated: *record.last_updated(),
            last_call: record.last_call().clone(),
        }
    }
}

/// Totals across every tracked service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct UsageSummary {
    /// Calls across all services
    total_calls: u64,
    /// Successful calls
    success_count: u64,
    /// Failed calls
    error_count: u64,
    /// Successful calls as a percentage
    success_rate: f64,
    /// Cost across all services
    total_cost: f64,
}

impl UsageSummary {
    fn from_stats<'a>(stats: impl Iterator<Item = &'a ServiceStats>) -> Self {
        let mut summary = Self::default();
        for service in stats {
            summary.total_calls += service.total_calls;
            summary.success_count += service.success_count;
            summary.error_count += service.error_count;
            summary.total_cost += service.total_cost;
        }
        summary.success_rate = rate(summary.success_count, summary.total_calls);
        summary
    }
}

/// Result of a usage query.
///
/// `summary` is only present when every service was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct UsageReport {
    /// Stats per service
    services: BTreeMap<String, ServiceStats>,
    /// Totals, for all-service queries
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<UsageSummary>,
}

impl UsageReport {
    pub(crate) fn single(service: Option<(String, ServiceStats)>) -> Self {
        Self {
            services: service.into_iter().collect(),
            summary: None,
        }
    }

    pub(crate) fn all(services: BTreeMap<String, ServiceStats>) -> Self {
        let summary = UsageSummary::from_stats(services.values());
        Self {
            services,
            summary: Some(summary),
        }
    }

    /// Stats for one service.
    pub fn service(&self, name: &str) -> Option<&ServiceStats> {
        self.services.get(name)
    }

    /// Whether no service matched.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Percentage of `part` in `whole`; zero when `whole` is zero.
fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
