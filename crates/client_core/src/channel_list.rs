//! Channel list shaping: ordering, permission gating, category sections.

use shared::{
    domain::{ChannelId, ChannelKind, GuildId, MessageId, RoleId, UserId},
    permissions::{compute_base, compute_effective, Permissions},
    protocol::{ChannelSummary, GuildDetail},
};

/// Text-like channels before voice channels, then by position, then id.
pub fn sort_channels(channels: &mut [ChannelSummary]) {
    channels.sort_by_key(|channel| (channel.kind.is_voice(), channel.position, channel.id));
}

/// The signed-in member as seen by one guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberContext {
    pub guild_id: GuildId,
    pub member_id: UserId,
    pub roles: Vec<RoleId>,
    /// Guild-level permissions before channel overwrites.
    pub base: Permissions,
}

impl MemberContext {
    /// Derive the guild-level permissions of `member_id` from a hydrated guild.
    pub fn from_guild(detail: &GuildDetail, member_id: UserId, roles: Vec<RoleId>) -> Self {
        let guild_id = detail.guild.id;
        let everyone_role = guild_id.everyone_role();
        let everyone = detail
            .roles
            .iter()
            .find(|role| role.id == everyone_role)
            .map_or(Permissions::empty(), |role| role.permissions);
        let role_permissions: Vec<(RoleId, Permissions)> = detail
            .roles
            .iter()
            .filter(|role| role.id != everyone_role)
            .map(|role| (role.id, role.permissions))
            .collect();
        let base = compute_base(
            everyone,
            &role_permissions,
            &roles,
            detail.owner_id == Some(member_id),
        );
        Self {
            guild_id,
            member_id,
            roles,
            base,
        }
    }
}

pub fn effective_permissions(channel: &ChannelSummary, ctx: &MemberContext) -> Permissions {
    compute_effective(
        ctx.base,
        ctx.guild_id,
        ctx.member_id,
        &ctx.roles,
        &channel.permission_overwrites,
    )
}

/// Categories are always listed; their children are filtered separately.
/// Without member context nothing is hidden.
pub fn can_view(channel: &ChannelSummary, ctx: Option<&MemberContext>) -> bool {
    if channel.kind == ChannelKind::Category || channel.kind.is_private() {
        return true;
    }
    ctx.map_or(true, |ctx| {
        effective_permissions(channel, ctx).contains(Permissions::VIEW_CHANNEL)
    })
}

pub fn can_send(channel: &ChannelSummary, ctx: Option<&MemberContext>) -> bool {
    if channel.kind.is_private() {
        return true;
    }
    ctx.map_or(true, |ctx| {
        effective_permissions(channel, ctx).contains(Permissions::SEND_MESSAGES)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSection {
    /// `None` for the leading section of uncategorized channels.
    pub category: Option<ChannelSummary>,
    pub channels: Vec<ChannelSummary>,
}

/// Group visible channels under their categories. Uncategorized channels
/// come first; sections left empty by filtering are dropped.
pub fn build_sections(
    channels: &[ChannelSummary],
    ctx: Option<&MemberContext>,
    show_nsfw: bool,
) -> Vec<ChannelSection> {
    let mut visible: Vec<ChannelSummary> = channels
        .iter()
        .filter(|channel| can_view(channel, ctx))
        .cloned()
        .collect();
    sort_channels(&mut visible);

    let listed = |channel: &&ChannelSummary| show_nsfw || !channel.nsfw;
    let mut sections = Vec::new();

    let uncategorized: Vec<ChannelSummary> = visible
        .iter()
        .filter(|channel| channel.parent_id.is_none() && channel.kind != ChannelKind::Category)
        .filter(listed)
        .cloned()
        .collect();
    if !uncategorized.is_empty() {
        sections.push(ChannelSection {
            category: None,
            channels: uncategorized,
        });
    }

    for category in visible
        .iter()
        .filter(|channel| channel.parent_id.is_none() && channel.kind == ChannelKind::Category)
    {
        let children: Vec<ChannelSummary> = visible
            .iter()
            .filter(|channel| channel.parent_id == Some(category.id))
            .filter(listed)
            .cloned()
            .collect();
        if !children.is_empty() {
            sections.push(ChannelSection {
                category: Some(category.clone()),
                channels: children,
            });
        }
    }
    sections
}

/// The last selected channel if it still exists, else the first
/// non-category channel in list order.
pub fn default_channel(channels: &[ChannelSummary], last_selected: Option<ChannelId>) -> Option<ChannelId> {
    if let Some(last) = last_selected {
        if channels.iter().any(|channel| channel.id == last) {
            return Some(last);
        }
    }
    let mut candidates: Vec<&ChannelSummary> = channels
        .iter()
        .filter(|channel| channel.kind != ChannelKind::Category)
        .collect();
    candidates.sort_by_key(|channel| (channel.kind.is_voice(), channel.position, channel.id));
    candidates.first().map(|channel| channel.id)
}

/// A channel is unread when its newest message is past the read marker.
/// Channels without a read marker are treated as read.
pub fn is_unread(channel: &ChannelSummary, last_read: Option<MessageId>) -> bool {
    match (last_read, channel.last_message_id) {
        (Some(read), Some(latest)) => read < latest,
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests/channel_list_tests.rs"]
mod tests;
