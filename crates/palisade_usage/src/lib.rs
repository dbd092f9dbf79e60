//! Per-service usage governance for outbound API calls.
//!
//! [`UsageGovernor`] keeps one [`ServiceUsageRecord`] per service with
//! hourly, daily and monthly buckets, running totals, token counts and costs.
//! Quotas (call counts per window, total calls, monthly budget) are checked
//! with [`UsageGovernor::check_limits`], which returns the first
//! [`ExceededLimit`](palisade_error::ExceededLimit) reached rather than an
//! error.
//!
//! Records are saved as `<service>.json` in the data directory, periodically
//! from `record_call` and on every configuration change. Bucket keys are
//! computed in UTC from an injectable [`Clock`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod call;
mod clock;
mod config;
mod governor;
mod record;
mod report;

pub use bucket::{BucketKeyError, Buckets, DayKey, HourKey, MonthKey};
pub use call::{CallRecord, Tokens};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ServiceQuota, UsageConfig, default_usage_dir};
pub use governor::UsageGovernor;
pub use record::{
    CallCounts, Costs, DailyUsage, HourlyUsage, LastCall, LimitKind, Limits, MonthlyUsage,
    ServiceUsageRecord, TokenUsage,
};
pub use report::{MonthStats, ServiceStats, TodayStats, UsageReport, UsageSummary};
