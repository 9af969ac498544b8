//! Turns backend data into chat message views and user-facing text.

use leaderboard_types::{
    ActionRow, Button, ButtonStyle, Embed, EmbedField, EmbedFooter, LeaderboardEntry, MessageView,
    SeasonStanding, TagHistoryEntry,
};

/// Discord's content limit, in Unicode scalar values.
pub const MESSAGE_CONTENT_LIMIT: usize = 2000;
const ELLIPSIS: &str = "...";

pub const PREV_BUTTON: &str = "leaderboard_prev";
pub const NEXT_BUTTON: &str = "leaderboard_next";
pub const CUSTOM_ID_SEPARATOR: char = '|';

pub const CHART_FILENAME: &str = "tag_history.png";
pub const CHART_CONTENT_TYPE: &str = "image/png";
pub const CHART_GENERATED: &str = "📈 Chart generated:";

const LEADERBOARD_COLOR: u32 = 0xF1C40F;

/// Cut `content` to the message limit, ending with `...` when shortened.
pub fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MESSAGE_CONTENT_LIMIT {
        return content.to_string();
    }
    let keep = MESSAGE_CONTENT_LIMIT - ELLIPSIS.len();
    let mut out: String = content.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Backend failure reasons are shown to users verbatim; backticks would let
/// them break out of formatting.
pub fn sanitize_reason(reason: &str) -> String {
    let cleaned: String = reason.chars().filter(|c| *c != '`').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "unknown error".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Split a button custom ID `"<name>|<page>"`.
pub fn parse_custom_id(custom_id: &str) -> Option<(&str, i64)> {
    let (name, page) = custom_id.split_once(CUSTOM_ID_SEPARATOR)?;
    if name.is_empty() {
        return None;
    }
    Some((name, page.trim().parse().ok()?))
}

/// Parse an embed description `"Page X/Y"` into `(X, Y)`.
pub fn parse_page_description(description: &str) -> Option<(u32, u32)> {
    let rest = description.trim().strip_prefix("Page ")?;
    let (current, total) = rest.split_once('/')?;
    let current: u32 = current.trim().parse().ok()?;
    let total: u32 = total.trim().parse().ok()?;
    (current >= 1 && current <= total).then_some((current, total))
}

/// Never less than one page, so an empty leaderboard still renders.
pub fn total_pages(entries: usize, per_page: usize) -> u32 {
    let per_page = per_page.max(1);
    entries.div_ceil(per_page).max(1) as u32
}

fn rank_label(rank: u32) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("#{n}"),
    }
}

fn entry_field(entry: &LeaderboardEntry) -> EmbedField {
    let value = match entry.tag_number {
        Some(tag) => format!("<@{}> · Tag #{}", entry.user_id, tag),
        None => format!("<@{}>", entry.user_id),
    };
    EmbedField {
        name: rank_label(entry.rank),
        value,
        inline: false,
    }
}

/// One leaderboard page with previous/next buttons. `page` is 1-based and
/// clamped to the available pages.
pub fn leaderboard_page(entries: &[LeaderboardEntry], page: u32, per_page: usize) -> MessageView {
    let per_page = per_page.max(1);
    let total = total_pages(entries.len(), per_page);
    let page = page.clamp(1, total);
    let start = (page as usize - 1) * per_page;
    let end = (start + per_page).min(entries.len());

    let mut fields: Vec<EmbedField> = entries
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .map(entry_field)
        .collect();
    if fields.is_empty() {
        fields.push(EmbedField {
            name: "No tags claimed yet".to_string(),
            value: "Use /claimtag to get on the board.".to_string(),
            inline: false,
        });
    }

    let embed = Embed {
        title: Some("🏆 Leaderboard".to_string()),
        description: Some(format!("Page {page}/{total}")),
        fields,
        color: Some(LEADERBOARD_COLOR),
        footer: Some(EmbedFooter {
            text: format!("{} players", entries.len()),
        }),
    };

    let row = ActionRow {
        buttons: vec![
            Button {
                style: ButtonStyle::Primary,
                label: "⬅️ Previous".to_string(),
                custom_id: format!("{PREV_BUTTON}{CUSTOM_ID_SEPARATOR}{}", i64::from(page) - 1),
                disabled: page <= 1,
            },
            Button {
                style: ButtonStyle::Primary,
                label: "➡️ Next".to_string(),
                custom_id: format!("{NEXT_BUTTON}{CUSTOM_ID_SEPARATOR}{}", i64::from(page) + 1),
                disabled: page >= total,
            },
        ],
    };

    MessageView::default().with_embed(embed).with_row(row)
}

fn history_line(entry: &TagHistoryEntry) -> String {
    let date = entry.occurred_at.format("%Y-%m-%d");
    match &entry.other_member_id {
        Some(other) => format!(
            "`{}` Tag #{} {} (with <@{}>)",
            date, entry.tag_number, entry.event_type, other
        ),
        None => format!("`{}` Tag #{} {}", date, entry.tag_number, entry.event_type),
    }
}

pub fn history_text(member_id: &str, entries: &[TagHistoryEntry]) -> String {
    if entries.is_empty() {
        return format!("📜 <@{member_id}> has no tag history yet.");
    }
    let mut text = format!("📜 Tag history for <@{member_id}>:\n");
    for entry in entries {
        text.push_str(&history_line(entry));
        text.push('\n');
    }
    truncate_content(text.trim_end())
}

pub fn standings_text(season_name: Option<&str>, standings: &[SeasonStanding]) -> String {
    let title = match season_name {
        Some(name) if !name.trim().is_empty() => format!("📊 Standings for **{}**", name.trim()),
        _ => "📊 Season standings".to_string(),
    };
    if standings.is_empty() {
        return format!("{title}\nNo rounds have been scored yet.");
    }
    let mut text = title;
    for standing in standings {
        text.push_str(&format!(
            "\n{}. <@{}> - {} pts ({} rounds)",
            standing.rank, standing.user_id, standing.total_points, standing.rounds_played
        ));
    }
    truncate_content(&text)
}
