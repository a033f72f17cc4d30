//! Channel permission bitset and overwrite resolution.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::domain::{GuildId, RoleId, UserId};

/// Every capability bit the platform currently defines.
pub const ALL_PERMISSION_BITS: u64 = 0x7FFF_FFFF_FFFF;

bitflags! {
    /// Set of capabilities granted to a member, either guild-wide or in a channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "u64", into = "u64")]
    pub struct Permissions: u64 {
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        /// Grants everything and bypasses channel overwrites.
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_CHANNELS = 1 << 4;
        const MANAGE_GUILD = 1 << 5;
        const ADD_REACTIONS = 1 << 6;
        const VIEW_AUDIT_LOG = 1 << 7;
        const PRIORITY_SPEAKER = 1 << 8;
        const STREAM = 1 << 9;
        const VIEW_CHANNEL = 1 << 10;
        const SEND_MESSAGES = 1 << 11;
        const SEND_TTS_MESSAGES = 1 << 12;
        const MANAGE_MESSAGES = 1 << 13;
        const EMBED_LINKS = 1 << 14;
        const ATTACH_FILES = 1 << 15;
        const READ_MESSAGE_HISTORY = 1 << 16;
        const MENTION_EVERYONE = 1 << 17;
        const USE_EXTERNAL_EMOJIS = 1 << 18;
        const VIEW_GUILD_INSIGHTS = 1 << 19;
        const CONNECT = 1 << 20;
        const SPEAK = 1 << 21;
        const MUTE_MEMBERS = 1 << 22;
        const DEAFEN_MEMBERS = 1 << 23;
        const MOVE_MEMBERS = 1 << 24;
        const USE_VAD = 1 << 25;
        const CHANGE_NICKNAME = 1 << 26;
        const MANAGE_NICKNAMES = 1 << 27;
        const MANAGE_ROLES = 1 << 28;
        const MANAGE_WEBHOOKS = 1 << 29;
        const MANAGE_EMOJIS = 1 << 30;
        const USE_APPLICATION_COMMANDS = 1 << 31;
        const REQUEST_TO_SPEAK = 1 << 32;
        const MANAGE_EVENTS = 1 << 33;
        const MANAGE_THREADS = 1 << 34;
        const CREATE_PUBLIC_THREADS = 1 << 35;
        const CREATE_PRIVATE_THREADS = 1 << 36;
        const USE_EXTERNAL_STICKERS = 1 << 37;
        const SEND_MESSAGES_IN_THREADS = 1 << 38;
        const USE_EMBEDDED_ACTIVITIES = 1 << 39;
        const MODERATE_MEMBERS = 1 << 40;
    }
}

impl Permissions {
    /// All capability bits, including ones without a named constant.
    pub fn full() -> Self {
        Self::from_bits_retain(ALL_PERMISSION_BITS)
    }

    /// Remove the overwrite's deny bits, then grant its allow bits.
    pub fn apply_overwrite(&mut self, overwrite: &PermissionOverwrite) {
        self.remove(overwrite.deny);
        self.insert(overwrite.allow);
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<u64> for Permissions {
    fn from(bits: u64) -> Self {
        Self::from_bits_retain(bits)
    }
}

impl From<Permissions> for u64 {
    fn from(value: Permissions) -> Self {
        value.bits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OverwriteTarget {
    Role(RoleId),
    Member(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn role(id: RoleId, allow: Permissions, deny: Permissions) -> Self {
        Self {
            target: OverwriteTarget::Role(id),
            allow,
            deny,
        }
    }

    pub fn member(id: UserId, allow: Permissions, deny: Permissions) -> Self {
        Self {
            target: OverwriteTarget::Member(id),
            allow,
            deny,
        }
    }
}

/// Effective permissions of a member in a channel.
///
/// Overwrites are applied in three tiers: the everyone role first, then every
/// role the member holds, then the member's own overwrite. Within a tier deny
/// bits are removed before allow bits are granted.
pub fn compute_effective(
    base: Permissions,
    guild_id: GuildId,
    member_id: UserId,
    member_roles: &[RoleId],
    overwrites: &[PermissionOverwrite],
) -> Permissions {
    if base.contains(Permissions::ADMINISTRATOR) {
        return Permissions::full();
    }

    let mut effective = base;
    let everyone = OverwriteTarget::Role(guild_id.everyone_role());
    if let Some(overwrite) = overwrites.iter().find(|o| o.target == everyone) {
        effective.apply_overwrite(overwrite);
    }

    for overwrite in overwrites {
        if let OverwriteTarget::Role(role_id) = overwrite.target {
            if overwrite.target != everyone && member_roles.contains(&role_id) {
                effective.apply_overwrite(overwrite);
            }
        }
    }

    if let Some(overwrite) = overwrites
        .iter()
        .find(|o| o.target == OverwriteTarget::Member(member_id))
    {
        effective.apply_overwrite(overwrite);
    }

    effective
}

/// Guild-wide permissions before any channel overwrite is considered.
pub fn compute_base(
    everyone: Permissions,
    roles: &[(RoleId, Permissions)],
    member_roles: &[RoleId],
    is_owner: bool,
) -> Permissions {
    if is_owner {
        return Permissions::full();
    }

    let base = roles
        .iter()
        .filter(|(id, _)| member_roles.contains(id))
        .fold(everyone, |acc, (_, perms)| acc | *perms);

    if base.contains(Permissions::ADMINISTRATOR) {
        Permissions::full()
    } else {
        base
    }
}
