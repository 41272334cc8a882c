pub mod habit;
pub mod hive;
pub mod insights;
pub mod profile;

use habithive_core::{Engine, SqliteStore};

use crate::config::Config;

/// Open the durable store and register the local profile.
pub(crate) fn open_engine(
) -> Result<(Engine<SqliteStore>, Config), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let engine = Engine::new(SqliteStore::open()?);
    engine.upsert_profile(&config.profile())?;
    Ok((engine, config))
}

pub(crate) fn print_json<T: serde::Serialize>(
    value: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
