// Channel lockdown: toggling SEND_MESSAGES for @everyone.
//
// Only the SEND_MESSAGES bit of the @everyone overwrite is touched. Anything
// else the overwrite allows or denies is kept as it was.

use poise::serenity_prelude as serenity;
use serenity::Permissions;

/// Overwrite bits with SEND_MESSAGES denied.
pub fn locked_bits(allow: Permissions, deny: Permissions) -> (Permissions, Permissions) {
    (
        allow.difference(Permissions::SEND_MESSAGES),
        deny | Permissions::SEND_MESSAGES,
    )
}

/// Overwrite bits with SEND_MESSAGES back to neutral (inherited from the
/// role's base permissions).
pub fn unlocked_bits(allow: Permissions, deny: Permissions) -> (Permissions, Permissions) {
    (
        allow.difference(Permissions::SEND_MESSAGES),
        deny.difference(Permissions::SEND_MESSAGES),
    )
}

fn is_text_channel(channel: &serenity::GuildChannel) -> bool {
    matches!(
        channel.kind,
        serenity::ChannelType::Text | serenity::ChannelType::News
    )
}

/// Lock or unlock one channel for @everyone.
///
/// An overwrite left with no bits at all after unlocking is deleted.
pub async fn set_channel_locked(
    http: &serenity::Http,
    channel: &serenity::GuildChannel,
    locked: bool,
) -> Result<(), serenity::Error> {
    // The @everyone role shares the guild's ID
    let everyone = serenity::PermissionOverwriteType::Role(serenity::RoleId::new(
        channel.guild_id.get(),
    ));

    let (allow, deny) = channel
        .permission_overwrites
        .iter()
        .find(|o| o.kind == everyone)
        .map(|o| (o.allow, o.deny))
        .unwrap_or((Permissions::empty(), Permissions::empty()));

    let (allow, deny) = if locked {
        locked_bits(allow, deny)
    } else {
        unlocked_bits(allow, deny)
    };

    if allow.is_empty() && deny.is_empty() {
        return channel.id.delete_permission(http, everyone).await;
    }

    channel
        .id
        .create_permission(
            http,
            serenity::PermissionOverwrite {
                allow,
                deny,
                kind: everyone,
            },
        )
        .await
}

/// Lock or unlock every text and announcement channel in a guild.
/// Returns how many channels were updated.
pub async fn set_guild_locked(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    locked: bool,
) -> usize {
    let channels = match guild_id.channels(http).await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::error!("Failed to list channels for lockdown: {}", e);
            return 0;
        }
    };

    let mut updated = 0;
    for channel in channels.values().filter(|c| is_text_channel(c)) {
        match set_channel_locked(http, channel, locked).await {
            Ok(()) => updated += 1,
            Err(e) => tracing::error!(
                channel_id = channel.id.get(),
                locked,
                "Failed to update channel lock: {}",
                e
            ),
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locking_denies_send_and_keeps_other_bits() {
        let allow = Permissions::SEND_MESSAGES | Permissions::ADD_REACTIONS;
        let deny = Permissions::ATTACH_FILES;

        let (allow, deny) = locked_bits(allow, deny);
        assert_eq!(allow, Permissions::ADD_REACTIONS);
        assert_eq!(deny, Permissions::ATTACH_FILES | Permissions::SEND_MESSAGES);
    }

    #[test]
    fn unlocking_clears_only_send() {
        let (allow, deny) = locked_bits(Permissions::ADD_REACTIONS, Permissions::ATTACH_FILES);

        let (allow, deny) = unlocked_bits(allow, deny);
        assert_eq!(allow, Permissions::ADD_REACTIONS);
        assert_eq!(deny, Permissions::ATTACH_FILES);
    }

    #[test]
    fn unlocking_a_lock_only_overwrite_leaves_nothing() {
        let (allow, deny) = locked_bits(Permissions::empty(), Permissions::empty());
        let (allow, deny) = unlocked_bits(allow, deny);
        assert!(allow.is_empty() && deny.is_empty());
    }
}
