// Violation detectors.
//
// Each detector looks at one message (or join) against one rule and either
// returns `None` or a `Violation`. A missing rule, a disabled rule, or a rule
// with a zero limit/window never fires. The stateful detectors receive the
// window they own; nothing here reaches for global state.

use super::automod_models::{
    window_from_ms, AntiRaidRule, CapsRule, DuplicateRule, InviteRule, LinkSpamRule,
    MassMentionRule, SpamRule, Violation,
};
use super::event_window::{EventWindow, UserKey};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://\S+").expect("link pattern is valid"));

static INVITE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:discord\.gg/|discord\.com/invite/|discordapp\.com/invite/)[a-z0-9]+")
        .expect("invite pattern is valid")
});

fn mute_duration(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}

/// Too many messages from one user inside the spam window.
///
/// Clears the user's window when it fires, so the next message starts a
/// fresh count.
pub fn check_spam(
    window: &EventWindow<UserKey>,
    key: UserKey,
    at: DateTime<Utc>,
    rule: Option<&SpamRule>,
) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled)?;
    if rule.message_limit == 0 || rule.time_window_ms == 0 {
        return None;
    }

    let messages = window.record_and_trip(
        key,
        at,
        (),
        window_from_ms(rule.time_window_ms),
        rule.message_limit as usize,
        |_| true,
    )?;

    Some(Violation::Spam {
        action: rule.action,
        mute_duration: mute_duration(rule.mute_duration_ms),
        messages,
        window_ms: rule.time_window_ms,
    })
}

/// Too many distinct users and roles mentioned in a single message.
pub fn check_mass_mention(mentions: u32, rule: Option<&MassMentionRule>) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled && r.limit > 0)?;
    if mentions < rule.limit {
        return None;
    }

    Some(Violation::MassMention {
        action: rule.action,
        mute_duration: mute_duration(rule.mute_duration_ms),
        mentions,
    })
}

/// Share of uppercase ASCII letters at or above the threshold.
///
/// Non-letters count toward the minimum length but not toward the ratio.
pub fn check_caps(content: &str, rule: Option<&CapsRule>) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled && r.percentage > 0)?;
    if content.chars().count() < rule.min_length {
        return None;
    }

    let (letters, upper) = content
        .chars()
        .filter(char::is_ascii_alphabetic)
        .fold((0u64, 0u64), |(letters, upper), c| {
            (letters + 1, upper + u64::from(c.is_ascii_uppercase()))
        });
    if letters == 0 {
        return None;
    }

    // Integer comparison keeps the boundary exact: percentage == threshold fires.
    if upper * 100 < u64::from(rule.percentage) * letters {
        return None;
    }

    Some(Violation::Caps {
        action: rule.action,
        percentage: upper as f64 * 100.0 / letters as f64,
    })
}

/// Too many `http(s)://` links in a single message.
pub fn check_link_spam(content: &str, rule: Option<&LinkSpamRule>) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled && r.limit > 0)?;
    let links = LINK_PATTERN.find_iter(content).count();
    if links < rule.limit as usize {
        return None;
    }

    Some(Violation::LinkSpam {
        action: rule.action,
        links,
    })
}

/// Any Discord invite link.
pub fn check_invites(content: &str, rule: Option<&InviteRule>) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled)?;
    if !INVITE_PATTERN.is_match(content) {
        return None;
    }

    Some(Violation::InviteLink {
        action: rule.action,
    })
}

/// The same exact content sent repeatedly inside the duplicate window.
///
/// Clears the user's window when it fires.
pub fn check_duplicate(
    window: &EventWindow<UserKey, String>,
    key: UserKey,
    content: &str,
    at: DateTime<Utc>,
    rule: Option<&DuplicateRule>,
) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled)?;
    if rule.limit == 0 || rule.time_window_ms == 0 {
        return None;
    }

    let occurrences = window.record_and_trip(
        key,
        at,
        content.to_string(),
        window_from_ms(rule.time_window_ms),
        rule.limit as usize,
        |previous| previous == content,
    )?;

    Some(Violation::Duplicate {
        action: rule.action,
        occurrences,
    })
}

/// Too many joins to one guild inside the raid window.
///
/// The window is not cleared, so every further join during the raid fires too.
pub fn check_anti_raid(
    window: &EventWindow<u64>,
    guild_id: u64,
    at: DateTime<Utc>,
    rule: Option<&AntiRaidRule>,
) -> Option<Violation> {
    let rule = rule.filter(|r| r.enabled)?;
    if rule.join_limit == 0 || rule.time_window_ms == 0 {
        return None;
    }

    let joins = window.record(guild_id, at, (), window_from_ms(rule.time_window_ms));
    if joins < rule.join_limit as usize {
        return None;
    }

    Some(Violation::Raid {
        action: rule.action,
        lockdown: rule.lockdown,
        joins,
        window_ms: rule.time_window_ms,
    })
}
