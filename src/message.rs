//! Telegram message templates (MarkdownV2)
//!
//! All user-supplied text goes through [`escape_markdown`] before it is
//! interpolated. Link targets use the narrower [`escape_link_url`].

use crate::types::{CycleReport, Listing, TrackedItem};

/// Characters Telegram's MarkdownV2 treats as markup
pub const RESERVED_CHARS: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Comments longer than this are cut
pub const MAX_COMMENT_CHARS: usize = 200;

const ELLIPSIS: &str = "\\.\\.\\.";

/// Prefix every MarkdownV2 reserved character with a backslash
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if RESERVED_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inside `(...)` of an inline link only `)` and `\` must be escaped
pub fn escape_link_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        if c == ')' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn or_na(value: Option<&str>) -> String {
    escape_markdown(value.unwrap_or("N/A"))
}

/// Notification for a listing that has not been seen before
pub fn format_listing(item: &TrackedItem, listing: &Listing) -> String {
    let mut message = format!(
        "🎵 *NEW LISTING FOUND\\!*\n\n\
         *Artist:* {artist}\n\
         *Title:* {title}\n\
         *Year:* {year}\n\n\
         💰 *Price:* {price}\n\
         📀 *Condition:* {condition}\n\
         📦 *Sleeve:* {sleeve}\n\
         👤 *Seller:* {seller} \\({rating}%\\)\n\
         🌍 *Ships from:* {ships}\n\n",
        artist = escape_markdown(&item.artist),
        title = escape_markdown(&item.title),
        year = escape_markdown(&item.year_display()),
        price = escape_markdown(&listing.price.to_string()),
        condition = escape_markdown(&listing.condition),
        sleeve = or_na(listing.sleeve_condition.as_deref()),
        seller = escape_markdown(&listing.seller_name),
        rating = or_na(listing.seller_rating.as_deref()),
        ships = or_na(listing.ships_from.as_deref()),
    );

    if let Some(comments) = listing.comments.as_deref().filter(|c| !c.is_empty()) {
        let truncated: String = comments.chars().take(MAX_COMMENT_CHARS).collect();
        let ellipsis = if comments.chars().count() > MAX_COMMENT_CHARS {
            ELLIPSIS
        } else {
            ""
        };
        message.push_str(&format!(
            "💬 *Comments:* {}{}\n\n",
            escape_markdown(&truncated),
            ellipsis
        ));
    }

    message.push_str(&format!(
        "🔗 [View Listing]({})\n🔗 [View Release]({})",
        escape_link_url(&listing.url),
        escape_link_url(&item.detail_url)
    ));

    message
}

/// Reply to /start and /help
pub fn welcome(interval_minutes: u64) -> String {
    format!(
        "🎵 *Discogs Wantlist Monitor Bot*\n\n\
         I'll notify you when items from your Discogs wantlist become available for sale\\!\n\n\
         *Commands:*\n\
         /start \\- Start the bot\n\
         /status \\- Check bot status\n\
         /check \\- Manually check wantlist now\n\
         /test \\- Send a test notification\n\
         /help \\- Show this help message\n\n\
         Monitoring is active\\. Checking every {} minutes\\.",
        interval_minutes
    )
}

/// Reply to /test
pub fn test_notification() -> String {
    "🧪 *Test Notification*\n\n\
     ✅ Success\\! The bot can send you messages\\.\n\n\
     This confirms that:\n\
     • Your Telegram connection is working\n\
     • Notifications will be delivered\n\
     • The bot is monitoring your wantlist\n\n\
     You'll receive notifications like this when new vinyl records from your wantlist are listed for sale\\!"
        .to_string()
}

/// Inputs for the /status reply
pub struct StatusView<'a> {
    pub seen_listings: Option<i64>,
    pub interval_minutes: u64,
    pub chat_id: Option<i64>,
    pub cycle_running: bool,
    pub last_cycle: Option<&'a CycleReport>,
}

pub fn status(view: &StatusView<'_>) -> String {
    let seen = view
        .seen_listings
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unavailable".to_string());
    let chat = view
        .chat_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "not set".to_string());
    let state = if view.cycle_running { "Checking now" } else { "Idle" };

    let mut text = format!(
        "✅ *Bot Status*\n\n\
         🔍 Monitoring: Active \\({}\\)\n\
         📊 Listings tracked: {}\n\
         ⏱ Check interval: {} minutes\n\
         💬 Chat ID: {}",
        escape_markdown(state),
        escape_markdown(&seen),
        view.interval_minutes,
        escape_markdown(&chat)
    );

    if let Some(report) = view.last_cycle {
        text.push_str(&format!(
            "\n🕑 Last check: {} \\({} new, {} of {} items checked\\)",
            escape_markdown(&report.finished_at.format("%Y-%m-%d %H:%M UTC").to_string()),
            report.new_listings,
            report.items_checked,
            report.items_total
        ));
    }

    text
}

pub fn checking() -> String {
    "🔍 Checking wantlist now\\.\\.\\.".to_string()
}

pub fn check_result(new_listings: usize) -> String {
    if new_listings == 0 {
        "✅ No new listings found\\.".to_string()
    } else {
        format!("✅ Found and sent {} new listing\\(s\\)\\!", new_listings)
    }
}

pub fn check_in_progress() -> String {
    "⏳ A check is already in progress\\. Try again in a moment\\.".to_string()
}
