use std::{collections::HashMap, fmt, str::FromStr};

use shared::{
    domain::GuildId,
    protocol::{GuildFolder, GuildSummary},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerListItem {
    Guild(GuildSummary),
    Folder {
        id: u64,
        name: String,
        guilds: Vec<GuildSummary>,
    },
}

/// Loose guilds (newest join first), then the user's folders in their saved
/// order. Folder entries only reference guilds that are loaded; folders left
/// empty are dropped and id-less pseudo-folders collapse to their guild.
pub fn order_server_list(guilds: &[GuildSummary], folders: &[GuildFolder]) -> Vec<ServerListItem> {
    let by_id: HashMap<GuildId, &GuildSummary> = guilds.iter().map(|g| (g.id, g)).collect();

    let mut loose: Vec<&GuildSummary> = guilds
        .iter()
        .filter(|guild| !folders.iter().any(|folder| folder.guild_ids.contains(&guild.id)))
        .collect();
    loose.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then_with(|| a.id.cmp(&b.id)));

    let mut items: Vec<ServerListItem> = loose
        .into_iter()
        .map(|guild| ServerListItem::Guild(guild.clone()))
        .collect();

    for folder in folders {
        let members: Vec<GuildSummary> = folder
            .guild_ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|guild| (*guild).clone()))
            .collect();
        match folder.id {
            Some(id) => {
                if members.is_empty() {
                    continue;
                }
                let name = folder.name.clone().unwrap_or_else(|| {
                    members
                        .iter()
                        .map(|guild| guild.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                });
                items.push(ServerListItem::Folder {
                    id,
                    name,
                    guilds: members,
                });
            }
            None => {
                if let Some(guild) = folder.guild_ids.first().and_then(|id| by_id.get(id)) {
                    items.push(ServerListItem::Guild((*guild).clone()));
                }
            }
        }
    }
    items
}

/// Server rail selection. Persisted as `"@me"` or the guild id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuildSelection {
    #[default]
    DirectMessages,
    Guild(GuildId),
}

impl fmt::Display for GuildSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuildSelection::DirectMessages => f.write_str("@me"),
            GuildSelection::Guild(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for GuildSelection {
    type Err = std::num::ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == "@me" {
            return Ok(GuildSelection::DirectMessages);
        }
        raw.parse::<u64>().map(|id| GuildSelection::Guild(GuildId(id)))
    }
}

/// The saved selection if its guild is still joined, else direct messages.
pub fn restore_selection(last: Option<GuildSelection>, guilds: &[GuildSummary]) -> GuildSelection {
    match last {
        Some(GuildSelection::Guild(id)) if guilds.iter().any(|guild| guild.id == id) => {
            GuildSelection::Guild(id)
        }
        _ => GuildSelection::DirectMessages,
    }
}
