//! # HabitHive Core Library
//!
//! This library provides the streak-and-insights aggregation engine for
//! HabitHive: the algorithms that turn a stream of dated, valued log
//! entries into streak counts, completion ratios, calendar heatmaps,
//! group-advancement decisions, and leaderboard rankings. The engine is
//! pure and stateless; persistence sits behind a store trait with
//! in-memory and SQLite backends, and the CLI binary is a thin layer over
//! the same service facade.
//!
//! ## Architecture
//!
//! - **Temporal Model**: user-local day resolution (configurable day-start
//!   hour) and calendar-day ranges
//! - **Engines**: streak walking, window completion, year heatmaps, hive
//!   consensus, invite validity, leaderboard ranking -- all deterministic
//!   functions over materialized snapshots
//! - **Store**: injectable [`Store`] trait with [`MemoryStore`] and
//!   [`SqliteStore`] implementations; the two concurrency-sensitive
//!   updates (invite use-count, streak advancement) are single conditional
//!   steps the backend applies atomically
//! - **Service**: [`Engine`] facade binding engines to a store with
//!   visibility and role checks
//!
//! ## Key Components
//!
//! - [`Engine`]: service facade
//! - [`LocalDayClock`]: day-cutoff-aware date resolution
//! - [`current_streak`]: backward streak walk
//! - [`evaluate_day`]: hive consensus verdict for a day

pub mod completion;
pub mod consensus;
pub mod day;
pub mod error;
pub mod invite;
pub mod leaderboard;
pub mod model;
pub mod service;
pub mod store;
pub mod streak;

pub use completion::{range_stats, window_completion, year_heatmap, RangeStats, YearHeatmap};
pub use consensus::{evaluate_day, AdvanceOutcome, DayEvaluation, MemberDayStatus};
pub use day::{day_range, LocalDayClock};
pub use error::{ConflictError, CoreError, ValidationError};
pub use leaderboard::LeaderboardEntry;
pub use model::{
    ActivityEvent, ActivityKind, Habit, HabitKind, HabitLog, Hive, HiveInvite, HiveMember,
    HiveMemberDay, HiveRule, LogEntry, MemberRole, Profile,
};
pub use service::{Engine, HabitSummary, HiveDetail, InsightsSummary, JoinOutcome};
pub use store::{MemoryStore, SqliteStore, Store};
pub use streak::current_streak;
