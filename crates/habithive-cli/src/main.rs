use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "habithive-cli", version, about = "HabitHive CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit management and logging
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Hive management, invites, and group streaks
    Hive {
        #[command(subcommand)]
        action: commands::hive::HiveAction,
    },
    /// Insights, dashboards, and leaderboards
    Insights {
        #[command(subcommand)]
        action: commands::insights::InsightsAction,
    },
    /// Local profile configuration
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Hive { action } => commands::hive::run(action),
        Commands::Insights { action } => commands::insights::run(action),
        Commands::Profile { action } => commands::profile::run(action),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
