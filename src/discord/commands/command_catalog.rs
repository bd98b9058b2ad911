// Discord commands module.
// Each feature gets its own command file.

pub mod ai_usage;

pub mod automod;

pub mod lockdown;

pub mod warnings;

// Bot presence management
pub mod presence;

use crate::discord::{Data, Error};

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        automod::automod(),
        lockdown::lock(),
        lockdown::unlock(),
        warnings::warn(),
        warnings::warnings(),
        warnings::removewarn(),
        warnings::clearwarnings(),
        ai_usage::aiusage(),
    ]
}
