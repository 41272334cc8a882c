use clap::Subcommand;

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the local profile
    Show,
    /// Update display name or day preferences
    Set {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        /// Offset of local time from UTC, in minutes
        #[arg(long)]
        utc_offset_minutes: Option<i32>,
        /// Hour (0-23) at which your day rolls over
        #[arg(long)]
        day_start_hour: Option<u32>,
    },
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ProfileAction::Show => {
            let (_, config) = open_engine()?;
            print_json(&config.profile())?;
        }
        ProfileAction::Set {
            display_name,
            avatar_url,
            utc_offset_minutes,
            day_start_hour,
        } => {
            let (engine, mut config) = open_engine()?;
            if let Some(name) = display_name {
                config.display_name = name;
            }
            if let Some(url) = avatar_url {
                config.avatar_url = Some(url);
            }
            if let Some(offset) = utc_offset_minutes {
                config.utc_offset_minutes = offset;
            }
            if let Some(hour) = day_start_hour {
                config.day_start_hour = hour;
            }
            engine.upsert_profile(&config.profile())?;
            config.save()?;
            print_json(&config.profile())?;
        }
    }
    Ok(())
}
