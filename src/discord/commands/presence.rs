// Bot presence.
//
// Discord-layer glue only: sets the activity shown under the bot's name.

use poise::serenity_prelude as serenity;

/// Called once the bot is ready.
pub fn on_ready(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::watching("over the server 🛡️");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
