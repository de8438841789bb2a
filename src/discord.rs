use anyhow::Result;
use log::warn;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{CacheHttp, ChannelId, CreateEmbed, CreateMessage, GuildId, Member, RoleId, User, UserId};

/// Random utility stuff for discord

/// Resolves the platform-recorded owner of a guild, hitting the cache first
pub async fn get_guild_owner_id(ctx: &serenity::Context, guild_id: GuildId) -> Result<UserId> {
    if let Some(guild) = guild_id.to_guild_cached(&ctx.cache) {
        return Ok(guild.owner_id);
    }
    Ok(guild_id.to_partial_guild(ctx.http()).await?.owner_id)
}

/// Best-effort direct message. Returns the DM channel id when delivery
/// succeeded and `None` when the user has DMs blocked; never errors.
pub async fn send_dm_safely(
    ctx: &serenity::Context,
    user: &User,
    embed: CreateEmbed,
) -> Option<ChannelId> {
    let dm = match user.create_dm_channel(ctx.http()).await {
        Ok(dm) => dm,
        Err(e) => {
            warn!("Failed to open DM channel with {}: {e}", user.id);
            return None;
        }
    };
    match dm
        .id
        .send_message(ctx.http(), CreateMessage::new().embed(embed))
        .await
    {
        Ok(_) => Some(dm.id),
        Err(e) => {
            warn!("Failed to DM {}: {e}", user.id);
            None
        }
    }
}

/// Whether the member carries at least one of the given roles
pub fn member_has_any_role(member: &Member, role_ids: &[RoleId]) -> bool {
    member.roles.iter().any(|role| role_ids.contains(role))
}
