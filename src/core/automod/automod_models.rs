// Auto-moderation domain models.
//
// These are pure domain types with no Discord dependencies. The Discord layer
// builds an `InboundMessage` / `MemberJoin` from gateway events and turns the
// resulting `Violation` into platform actions.

use chrono::{DateTime, Duration as WindowDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What the caller should do about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModAction {
    Delete,
    Warn,
    Mute,
    Kick,
    Ban,
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModAction::Delete => write!(f, "delete"),
            ModAction::Warn => write!(f, "warn"),
            ModAction::Mute => write!(f, "mute"),
            ModAction::Kick => write!(f, "kick"),
            ModAction::Ban => write!(f, "ban"),
        }
    }
}

impl ModAction {
    /// Whether the triggering message is deleted once the action succeeds.
    pub fn removes_message(self) -> bool {
        matches!(self, ModAction::Delete | ModAction::Mute)
    }
}

// ============================================================================
// RULES
// ============================================================================
// Every rule deserializes with defaults for missing fields, so a partially
// written config file still yields a usable rule.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpamRule {
    pub enabled: bool,
    pub message_limit: u32,
    pub time_window_ms: u64,
    pub action: ModAction,
    pub mute_duration_ms: Option<u64>,
}

impl Default for SpamRule {
    fn default() -> Self {
        Self {
            enabled: true,
            message_limit: 5,
            time_window_ms: 5_000,
            action: ModAction::Mute,
            mute_duration_ms: Some(600_000), // 10 minutes
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MassMentionRule {
    pub enabled: bool,
    pub limit: u32,
    pub action: ModAction,
    pub mute_duration_ms: Option<u64>,
}

impl Default for MassMentionRule {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 5,
            action: ModAction::Mute,
            mute_duration_ms: Some(1_800_000), // 30 minutes
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapsRule {
    pub enabled: bool,
    /// Inclusive threshold, 0-100.
    pub percentage: u32,
    /// Messages shorter than this (in characters) are never checked.
    pub min_length: usize,
    pub action: ModAction,
}

impl Default for CapsRule {
    fn default() -> Self {
        Self {
            enabled: true,
            percentage: 70,
            min_length: 10,
            action: ModAction::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkSpamRule {
    pub enabled: bool,
    pub limit: u32,
    pub action: ModAction,
}

impl Default for LinkSpamRule {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 3,
            action: ModAction::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InviteRule {
    pub enabled: bool,
    pub action: ModAction,
}

impl Default for InviteRule {
    fn default() -> Self {
        Self {
            enabled: false,
            action: ModAction::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateRule {
    pub enabled: bool,
    pub limit: u32,
    pub time_window_ms: u64,
    pub action: ModAction,
}

impl Default for DuplicateRule {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 3,
            time_window_ms: 10_000,
            action: ModAction::Warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AntiRaidRule {
    pub enabled: bool,
    pub join_limit: u32,
    pub time_window_ms: u64,
    pub action: ModAction,
    /// Deny `SendMessages` to the default role on every text channel when a
    /// raid fires.
    pub lockdown: bool,
}

impl Default for AntiRaidRule {
    fn default() -> Self {
        Self {
            enabled: true,
            join_limit: 10,
            time_window_ms: 10_000,
            action: ModAction::Kick,
            lockdown: true,
        }
    }
}

/// Per-guild auto-moderation configuration.
///
/// A rule that is missing from a stored config deserializes as `None` and
/// never fires. Guilds with nothing stored get [`AutomodConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomodConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub spam: Option<SpamRule>,
    #[serde(default)]
    pub mass_mention: Option<MassMentionRule>,
    #[serde(default)]
    pub caps: Option<CapsRule>,
    #[serde(default)]
    pub link_spam: Option<LinkSpamRule>,
    #[serde(default)]
    pub invites: Option<InviteRule>,
    #[serde(default)]
    pub duplicate: Option<DuplicateRule>,
    #[serde(default)]
    pub anti_raid: Option<AntiRaidRule>,
    #[serde(default)]
    pub ignored_roles: Vec<u64>,
    #[serde(default)]
    pub ignored_channels: Vec<u64>,
    /// Channel that receives an embed for every automod action.
    #[serde(default)]
    pub log_channel: Option<u64>,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for AutomodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spam: Some(SpamRule::default()),
            mass_mention: Some(MassMentionRule::default()),
            caps: Some(CapsRule::default()),
            link_spam: Some(LinkSpamRule::default()),
            invites: Some(InviteRule::default()),
            duplicate: Some(DuplicateRule::default()),
            anti_raid: Some(AntiRaidRule::default()),
            ignored_roles: Vec::new(),
            ignored_channels: Vec::new(),
            log_channel: None,
        }
    }
}

impl AutomodConfig {
    /// Master switch off and no rules configured. Nothing fires.
    pub fn rules_off() -> Self {
        Self {
            enabled: false,
            spam: None,
            mass_mention: None,
            caps: None,
            link_spam: None,
            invites: None,
            duplicate: None,
            anti_raid: None,
            ignored_roles: Vec::new(),
            ignored_channels: Vec::new(),
            log_channel: None,
        }
    }

    /// Whether the author or channel of a message is exempt from automod.
    pub fn is_ignored(&self, channel_id: u64, author_roles: &[u64]) -> bool {
        if self.ignored_channels.contains(&channel_id) {
            return true;
        }
        author_roles
            .iter()
            .any(|role| self.ignored_roles.contains(role))
    }
}

/// Feature switches exposed to moderators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomodFeature {
    /// The master switch.
    All,
    Spam,
    MassMention,
    Caps,
    LinkSpam,
    Invites,
    Duplicate,
    AntiRaid,
}

impl fmt::Display for AutomodFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutomodFeature::All => "Auto-moderation",
            AutomodFeature::Spam => "Spam detection",
            AutomodFeature::MassMention => "Mass mention protection",
            AutomodFeature::Caps => "Caps lock filter",
            AutomodFeature::LinkSpam => "Link spam detection",
            AutomodFeature::Invites => "Invite link filter",
            AutomodFeature::Duplicate => "Duplicate message detection",
            AutomodFeature::AntiRaid => "Anti-raid protection",
        };
        f.write_str(name)
    }
}

// ============================================================================
// INPUT EVENTS
// ============================================================================

/// A guild message, normalized away from serenity types.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_roles: Vec<u64>,
    pub content: String,
    /// Distinct users mentioned.
    pub user_mentions: u32,
    /// Distinct roles mentioned.
    pub role_mentions: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MemberJoin {
    pub guild_id: u64,
    pub user_id: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// VIOLATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Spam,
    MassMention,
    Caps,
    LinkSpam,
    InviteLink,
    Duplicate,
    Raid,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::Spam => "spam",
            ViolationKind::MassMention => "mass-mention",
            ViolationKind::Caps => "caps",
            ViolationKind::LinkSpam => "link-spam",
            ViolationKind::InviteLink => "invite-link",
            ViolationKind::Duplicate => "duplicate",
            ViolationKind::Raid => "raid",
        };
        f.write_str(name)
    }
}

/// Detector output. Each variant only carries what is relevant to its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Spam {
        action: ModAction,
        mute_duration: Option<Duration>,
        messages: usize,
        window_ms: u64,
    },
    MassMention {
        action: ModAction,
        mute_duration: Option<Duration>,
        mentions: u32,
    },
    Caps {
        action: ModAction,
        percentage: f64,
    },
    LinkSpam {
        action: ModAction,
        links: usize,
    },
    InviteLink {
        action: ModAction,
    },
    Duplicate {
        action: ModAction,
        occurrences: usize,
    },
    Raid {
        action: ModAction,
        lockdown: bool,
        joins: usize,
        window_ms: u64,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::Spam { .. } => ViolationKind::Spam,
            Violation::MassMention { .. } => ViolationKind::MassMention,
            Violation::Caps { .. } => ViolationKind::Caps,
            Violation::LinkSpam { .. } => ViolationKind::LinkSpam,
            Violation::InviteLink { .. } => ViolationKind::InviteLink,
            Violation::Duplicate { .. } => ViolationKind::Duplicate,
            Violation::Raid { .. } => ViolationKind::Raid,
        }
    }

    pub fn action(&self) -> ModAction {
        match self {
            Violation::Spam { action, .. }
            | Violation::MassMention { action, .. }
            | Violation::Caps { action, .. }
            | Violation::LinkSpam { action, .. }
            | Violation::InviteLink { action }
            | Violation::Duplicate { action, .. }
            | Violation::Raid { action, .. } => *action,
        }
    }

    /// Timeout length for `mute` actions, when the rule defines one.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Violation::Spam { mute_duration, .. }
            | Violation::MassMention { mute_duration, .. } => *mute_duration,
            _ => None,
        }
    }

    /// Whether the guild should be locked down (raids only).
    pub fn lockdown(&self) -> bool {
        matches!(self, Violation::Raid { lockdown: true, .. })
    }

    /// Human-readable reason, used for audit log entries and warnings.
    pub fn reason(&self) -> String {
        match self {
            Violation::Spam {
                messages,
                window_ms,
                ..
            } => format!(
                "Spam detected: {} messages in {}s",
                messages,
                *window_ms as f64 / 1000.0
            ),
            Violation::MassMention { mentions, .. } => {
                format!("Mass mention: {} mentions", mentions)
            }
            Violation::Caps { percentage, .. } => format!("Excessive caps: {:.0}%", percentage),
            Violation::LinkSpam { links, .. } => format!("Link spam: {} links", links),
            Violation::InviteLink { .. } => "Discord invite link detected".to_string(),
            Violation::Duplicate { occurrences, .. } => {
                format!("Duplicate message: sent {} times", occurrences)
            }
            Violation::Raid {
                joins, window_ms, ..
            } => format!(
                "Raid detected: {} joins in {}s",
                joins,
                *window_ms as f64 / 1000.0
            ),
        }
    }
}

/// Converts a configured millisecond span into a window length.
pub(crate) fn window_from_ms(ms: u64) -> WindowDuration {
    WindowDuration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}
