use std::time::Duration;

use anyhow::Result;
use log::error;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{
    CacheHttp, ChannelId, ComponentInteraction, CreateActionRow, CreateButton, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, GuildId, Member, Timestamp, UserId,
};
use poise::{Context, CreateReply};

use crate::db::establish_db_connection;
use crate::discord::member_has_any_role;
use crate::embeds::{default_embed, EmbedColor};
use crate::error::TicketError;
use crate::services::tickets::form_flow::{run_form_session, FormSessionGuard};
use crate::services::tickets::ticket_db::{self, Ticket, TicketType};
use crate::services::tickets::ticket_service;
use crate::services::tickets::CLOSE_GRACE_SECONDS;
use crate::Data;

/// `custom_id` of the close button placed on every simple-ticket welcome message
pub const CLOSE_BUTTON_ID: &str = "ticket_close";

/// Discord reports a missing channel-management grant as an HTTP 403. Any
/// other serenity failure (rate limit, gateway, network) is not a permission
/// problem and must surface through the normal error path.
fn is_permission_denied(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<serenity::Error>(),
        Some(serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(resp)))
            if resp.status_code.as_u16() == 403
    )
}

/// Open a support ticket
#[poise::command(slash_command, guild_only)]
pub async fn ticket(ctx: Context<'_, Data, anyhow::Error>) -> Result<()> {
    let guild_id = ctx.guild_id().unwrap();
    let mut db = establish_db_connection().await?;
    let Some(settings) = ticket_db::get_guild_settings(&mut db, guild_id.get()).await? else {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error).description(
                    "The ticket system has not been configured for this server. \
                     Please contact an administrator.",
                ),
            ),
        )
        .await?;
        return Ok(());
    };

    match settings.ticket_type()? {
        TicketType::Simple => create_simple_ticket(ctx, &settings).await,
        TicketType::Form => create_form_ticket(ctx, &settings).await,
    }
}

async fn create_simple_ticket(
    ctx: Context<'_, Data, anyhow::Error>,
    settings: &ticket_db::GuildSettings,
) -> Result<()> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().unwrap();
    let mut db = establish_db_connection().await?;
    let (channel, ticket_id) = match ticket_service::create_simple_ticket(
        ctx.serenity_context(),
        &mut db,
        guild_id,
        ctx.author(),
    )
    .await
    {
        Ok(created) => created,
        Err(e) if is_permission_denied(&e) => {
            ctx.send(
                CreateReply::default().ephemeral(true).embed(
                    default_embed(EmbedColor::Error)
                        .title("Permission Error")
                        .description("I don't have permission to create channels in this server."),
                ),
            )
            .await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let welcome = default_embed(EmbedColor::Info)
        .title("Ticket Created")
        .description(settings.welcome_message.clone())
        .field(
            "Ticket Information",
            format!(
                "**Created by:** <@{}>\n**Ticket ID:** {ticket_id}\n**Created:** <t:{}:F>",
                ctx.author().id,
                Timestamp::now().unix_timestamp(),
            ),
            false,
        );
    let close_button = CreateButton::new(CLOSE_BUTTON_ID)
        .style(serenity::ButtonStyle::Danger)
        .label("Close Ticket");
    channel
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .embed(welcome)
                .components(vec![CreateActionRow::Buttons(vec![close_button])]),
        )
        .await?;

    ctx.send(
        CreateReply::default().ephemeral(true).embed(
            default_embed(EmbedColor::Success)
                .title("Ticket Created")
                .description(format!("Your ticket has been created: <#{}>", channel.id)),
        ),
    )
    .await?;
    Ok(())
}

async fn create_form_ticket(
    ctx: Context<'_, Data, anyhow::Error>,
    settings: &ticket_db::GuildSettings,
) -> Result<()> {
    let guild_id = ctx.guild_id().unwrap();
    let mut db = establish_db_connection().await?;
    let questions = ticket_db::get_form_questions(&mut db, guild_id.get()).await?;
    if questions.is_empty() {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error).description(
                    "No form questions have been configured. Please contact an administrator.",
                ),
            ),
        )
        .await?;
        return Ok(());
    }

    // Held for the whole session; dropping it on any exit path frees the slot
    let _session = match FormSessionGuard::acquire(&ctx.data().active_forms, ctx.author().id) {
        Ok(guard) => guard,
        Err(TicketError::FormInProgress) => {
            ctx.send(
                CreateReply::default().ephemeral(true).embed(
                    default_embed(EmbedColor::Error)
                        .title("Form in Progress")
                        .description(
                            "You already have an active form session. Please complete it first.",
                        ),
                ),
            )
            .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    run_form_session(ctx, settings, &questions).await
}

pub enum CloseOutcome {
    NotATicket,
    Denied,
    Closed(Ticket),
}

/// Composite close authorization: owner/co-owner, a ticket-role holder, or
/// the ticket's original requester. On success the ticket is flipped to
/// closed; a ticket that is already closed reports as [`CloseOutcome::NotATicket`].
pub async fn authorize_and_close(
    ctx: &serenity::Context,
    guild_id: GuildId,
    channel_id: ChannelId,
    member: &Member,
) -> Result<CloseOutcome> {
    let mut db = establish_db_connection().await?;
    let Some(ticket) = ticket_db::get_ticket_by_channel(&mut db, channel_id.get()).await? else {
        return Ok(CloseOutcome::NotATicket);
    };

    let is_staff =
        ticket_service::is_authorized(ctx, &mut db, guild_id, member.user.id).await?;
    let has_ticket_role = {
        let role_ids: Vec<serenity::RoleId> = ticket_db::get_ticket_roles(&mut db, guild_id.get())
            .await?
            .into_iter()
            .map(|r| serenity::RoleId::new(r.role_id))
            .collect();
        member_has_any_role(member, &role_ids)
    };
    let is_requester = ticket.user_id == member.user.id.get();
    if !(is_staff || has_ticket_role || is_requester) {
        return Ok(CloseOutcome::Denied);
    }

    match ticket_service::close_ticket(&mut db, channel_id.get()).await? {
        Some(ticket) => Ok(CloseOutcome::Closed(ticket)),
        None => Ok(CloseOutcome::NotATicket),
    }
}

/// The channel stays fully functional during the grace window
async fn delete_after_grace(ctx: &serenity::Context, channel_id: ChannelId, closed_by: UserId) {
    tokio::time::sleep(Duration::from_secs(CLOSE_GRACE_SECONDS)).await;
    if let Err(e) = channel_id
        .delete(ctx.http())
        .await
    {
        error!("Failed to delete closed ticket channel {channel_id} (closed by {closed_by}): {e}");
    }
}

fn closed_embed(closed_by: UserId) -> serenity::CreateEmbed {
    default_embed(EmbedColor::Success)
        .title("Ticket Closed")
        .description(format!(
            "This ticket has been closed by <@{closed_by}>.\nThe channel will be deleted in {CLOSE_GRACE_SECONDS} seconds.",
        ))
}

/// Close the current ticket channel
#[poise::command(slash_command, rename = "close-ticket", guild_only)]
pub async fn close_ticket(ctx: Context<'_, Data, anyhow::Error>) -> Result<()> {
    let guild_id = ctx.guild_id().unwrap();
    let Some(member) = ctx.author_member().await else {
        return Ok(());
    };
    match authorize_and_close(ctx.serenity_context(), guild_id, ctx.channel_id(), &member).await? {
        CloseOutcome::NotATicket => {
            ctx.send(
                CreateReply::default().ephemeral(true).embed(
                    default_embed(EmbedColor::Error)
                        .title("Not a Ticket")
                        .description("This command can only be used in open ticket channels."),
                ),
            )
            .await?;
        }
        CloseOutcome::Denied => {
            ctx.send(
                CreateReply::default().ephemeral(true).embed(
                    default_embed(EmbedColor::Error)
                        .title("Access Denied")
                        .description("You don't have permission to close this ticket."),
                ),
            )
            .await?;
        }
        CloseOutcome::Closed(_) => {
            ctx.send(CreateReply::default().embed(closed_embed(ctx.author().id)))
                .await?;
            delete_after_grace(ctx.serenity_context(), ctx.channel_id(), ctx.author().id).await;
        }
    }
    Ok(())
}

/// Handler for the close button on welcome messages. Routed here directly
/// from the gateway event handler; shares the exact close routine the slash
/// command uses.
pub async fn handle_close_button(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
) -> Result<()> {
    let (Some(guild_id), Some(member)) = (interaction.guild_id, interaction.member.as_ref())
    else {
        return Ok(());
    };
    let ephemeral_reply = |embed| {
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .embed(embed)
                .ephemeral(true),
        )
    };
    match authorize_and_close(ctx, guild_id, interaction.channel_id, member).await? {
        CloseOutcome::NotATicket => {
            interaction
                .create_response(
                    ctx.http(),
                    ephemeral_reply(
                        default_embed(EmbedColor::Error)
                            .description("This channel is not an open ticket."),
                    ),
                )
                .await?;
        }
        CloseOutcome::Denied => {
            interaction
                .create_response(
                    ctx.http(),
                    ephemeral_reply(
                        default_embed(EmbedColor::Error)
                            .description("You don't have permission to close this ticket."),
                    ),
                )
                .await?;
        }
        CloseOutcome::Closed(_) => {
            interaction
                .create_response(
                    ctx.http(),
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(closed_embed(member.user.id)),
                    ),
                )
                .await?;
            delete_after_grace(ctx, interaction.channel_id, member.user.id).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_errors_are_not_permission_failures() {
        let err = anyhow::anyhow!("connection reset by peer");
        assert!(!is_permission_denied(&err));
    }

    #[test]
    fn non_http_serenity_errors_are_not_permission_failures() {
        let err = anyhow::Error::new(serenity::Error::Other("gateway closed"));
        assert!(!is_permission_denied(&err));
    }
}
