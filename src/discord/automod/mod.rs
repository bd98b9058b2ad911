// Discord automod module
//
// Applies the violations found by the core automod service: message actions
// for regular messages, kicks/bans and lockdown for raids.

pub mod lockdown;
pub mod message_handler;
pub mod mod_log;
pub mod raid_handler;

pub use message_handler::handle_message;
pub use raid_handler::handle_member_join;
