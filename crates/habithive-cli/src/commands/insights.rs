use chrono::{Datelike, Utc};
use clap::Subcommand;
use uuid::Uuid;

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum InsightsAction {
    /// Overall completion, streaks, and the year comb
    Summary {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Week/month/year dashboard
    Ranges,
    /// Calendar-year heatmap (defaults to the current year)
    Heatmap {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Co-member ranking across your hives
    Leaderboard,
    /// Activity feed across your hives
    Feed {
        #[arg(long)]
        hive_id: Option<Uuid>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

pub fn run(action: InsightsAction) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, config) = open_engine()?;
    let user_id = config.user_id;
    let now = Utc::now();

    match action {
        InsightsAction::Summary { days } => {
            let summary = engine.insights_summary(user_id, days, now)?;
            print_json(&summary)?;
        }
        InsightsAction::Ranges => {
            let stats = engine.range_stats(user_id, now)?;
            print_json(&stats)?;
        }
        InsightsAction::Heatmap { year } => {
            let year = year.unwrap_or_else(|| now.year());
            let heatmap = engine.year_heatmap(user_id, year)?;
            print_json(&heatmap)?;
        }
        InsightsAction::Leaderboard => {
            let board = engine.leaderboard(user_id, now)?;
            print_json(&board)?;
        }
        InsightsAction::Feed { hive_id, limit } => {
            let feed = engine.activity_feed(user_id, hive_id, limit)?;
            print_json(&feed)?;
        }
    }
    Ok(())
}
