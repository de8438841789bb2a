use anyhow::Result;
use poise::serenity_prelude::User;
use poise::{Context, CreateReply};

use crate::db::establish_db_connection;
use crate::discord::{get_guild_owner_id, send_dm_safely};
use crate::embeds::{default_embed, EmbedColor};
use crate::services::tickets::{ticket_db, ticket_service};
use crate::Data;

/// Co-owner management. Deliberately gated more strictly than the rest of
/// the configuration surface: only the guild owner or members holding the
/// Administrator permission bit may touch the co-owner set.

async fn check_owner_or_admin(ctx: Context<'_, Data, anyhow::Error>) -> Result<bool> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };
    let authorized = if get_guild_owner_id(ctx.serenity_context(), guild_id).await?
        == ctx.author().id
    {
        true
    } else if let Some(member) = ctx.author_member().await {
        // Interaction members carry their resolved permission set
        member.permissions.is_some_and(|perms| perms.administrator())
    } else {
        false
    };
    if !authorized {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error)
                    .title("Access Denied")
                    .description("Only the server owner or administrators can use this command."),
            ),
        )
        .await?;
    }
    Ok(authorized)
}

/// Add a co-owner who can manage the ticket system
#[poise::command(slash_command, rename = "add-co-owner", guild_only)]
pub async fn add_co_owner(
    ctx: Context<'_, Data, anyhow::Error>,
    #[description = "User to add as co-owner"] user: User,
) -> Result<()> {
    if !check_owner_or_admin(ctx).await? {
        return Ok(());
    }
    let invalid = if user.id == ctx.author().id {
        Some("You cannot add yourself as a co-owner.")
    } else if user.bot {
        Some("You cannot add bots as co-owners.")
    } else {
        None
    };
    if let Some(reason) = invalid {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error)
                    .title("Invalid User")
                    .description(reason),
            ),
        )
        .await?;
        return Ok(());
    }

    let guild_id = ctx.guild_id().unwrap().get();
    let mut db = establish_db_connection().await?;
    if ticket_db::is_co_owner(&mut db, guild_id, user.id.get()).await? {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error)
                    .title("Already Co-Owner")
                    .description(format!("<@{}> is already a co-owner.", user.id)),
            ),
        )
        .await?;
        return Ok(());
    }
    ticket_service::add_co_owner(&mut db, guild_id, user.id.get(), ctx.author().id.get()).await?;

    ctx.send(
        CreateReply::default().embed(
            default_embed(EmbedColor::Success)
                .title("Co-Owner Added")
                .description(format!(
                    "<@{}> has been added as a co-owner.\nThey can now manage the ticket system.",
                    user.id
                )),
        ),
    )
    .await?;
    // Best-effort notification, failures are already logged
    send_dm_safely(
        ctx.serenity_context(),
        &user,
        default_embed(EmbedColor::Info)
            .title("Co-Owner Added")
            .description(
                "You have been added as a co-owner of the ticket system. \
                 You can now use ticket management commands.",
            ),
    )
    .await;
    Ok(())
}

/// Remove a co-owner
#[poise::command(slash_command, rename = "remove-co-owner", guild_only)]
pub async fn remove_co_owner(
    ctx: Context<'_, Data, anyhow::Error>,
    #[description = "User to remove as co-owner"] user: User,
) -> Result<()> {
    if !check_owner_or_admin(ctx).await? {
        return Ok(());
    }
    let guild_id = ctx.guild_id().unwrap().get();
    let mut db = establish_db_connection().await?;
    if ticket_service::remove_co_owner(&mut db, guild_id, user.id.get()).await? {
        ctx.send(
            CreateReply::default().embed(
                default_embed(EmbedColor::Success)
                    .title("Co-Owner Removed")
                    .description(format!("<@{}> has been removed as a co-owner.", user.id)),
            ),
        )
        .await?;
        send_dm_safely(
            ctx.serenity_context(),
            &user,
            default_embed(EmbedColor::Info)
                .title("Co-Owner Removed")
                .description("You have been removed as a co-owner of the ticket system."),
        )
        .await;
    } else {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error)
                    .title("Not Found")
                    .description(format!("<@{}> is not a co-owner.", user.id)),
            ),
        )
        .await?;
    }
    Ok(())
}

/// List all co-owners
#[poise::command(slash_command, rename = "list-co-owners", guild_only)]
pub async fn list_co_owners(ctx: Context<'_, Data, anyhow::Error>) -> Result<()> {
    if !check_owner_or_admin(ctx).await? {
        return Ok(());
    }
    let guild_id = ctx.guild_id().unwrap().get();
    let mut db = establish_db_connection().await?;
    let co_owners = ticket_db::get_co_owners(&mut db, guild_id).await?;

    let description = if co_owners.is_empty() {
        "No co-owners have been added to this server.".to_string()
    } else {
        let listing = co_owners
            .iter()
            .map(|c| format!("- <@{}> (added by <@{}>)", c.user_id, c.assigned_by))
            .collect::<Vec<_>>()
            .join("\n");
        format!("**Total:** {}\n\n{listing}", co_owners.len())
    };
    ctx.send(
        CreateReply::default().embed(
            default_embed(EmbedColor::Info)
                .title("Co-Owners")
                .description(description),
        ),
    )
    .await?;
    Ok(())
}
