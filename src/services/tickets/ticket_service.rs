use anyhow::Result;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncMysqlConnection};
use log::{info, warn};
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{
    CacheHttp, ChannelType, CreateChannel, GuildChannel, GuildId, PermissionOverwrite,
    PermissionOverwriteType, Permissions, RoleId, User,
};

use crate::discord::get_guild_owner_id;
use crate::error::TicketError;
use crate::services::tickets::ticket_db::{
    self, CollectedResponse, GuildSettings, NewFormQuestion, NewTicket, Ticket, TicketStatus,
    TicketType,
};
use crate::services::tickets::{MAX_QUESTIONS, TICKET_CHANNEL_PREFIX};

/// Business rules for the ticket system. This is the only module allowed to
/// make authorization decisions or enforce cross-field validation; the
/// repository below it is pure data access and the commands above it only
/// parse input and render results.

/// The single authorization predicate used by every privileged command:
/// the platform-recorded guild owner, or a stored co-owner. The stricter
/// owner-or-administrator check for co-owner management lives in the
/// command layer since it needs a platform permission bit.
pub async fn is_authorized(
    ctx: &serenity::Context,
    db: &mut AsyncMysqlConnection,
    guild_id: GuildId,
    user_id: serenity::UserId,
) -> Result<bool> {
    if get_guild_owner_id(ctx, guild_id).await? == user_id {
        return Ok(true);
    }
    ticket_db::is_co_owner(db, guild_id.get(), user_id.get()).await
}

/// Records `user_id` as a co-owner, idempotently. Duplicate checks belong
/// to the caller so it can report them before writing.
pub async fn add_co_owner(
    db: &mut AsyncMysqlConnection,
    guild_id: u64,
    user_id: u64,
    added_by: u64,
) -> Result<()> {
    ticket_db::add_co_owner(db, guild_id, user_id, added_by).await
}

/// Removes a co-owner record; `false` means there was nothing to remove.
pub async fn remove_co_owner(
    db: &mut AsyncMysqlConnection,
    guild_id: u64,
    user_id: u64,
) -> Result<bool> {
    ticket_db::remove_co_owner(db, guild_id, user_id).await
}

/// Persists guild settings via upsert. Input is expected to be already
/// validated by the caller; in particular `ticket_type == Form` implies a
/// target channel was supplied.
pub async fn setup_guild_settings(
    db: &mut AsyncMysqlConnection,
    guild_id: u64,
    ticket_type: TicketType,
    welcome_message: String,
    target_channel_id: Option<u64>,
) -> Result<GuildSettings> {
    let settings = GuildSettings {
        guild_id,
        ticket_type: ticket_type.as_str().to_string(),
        welcome_message,
        target_channel_id,
    };
    ticket_db::save_guild_settings(db, &settings).await?;
    Ok(settings)
}

/// Assigns dense 1-based orders to the question texts, enforcing the cap
pub fn build_question_set(
    guild_id: u64,
    texts: &[String],
) -> Result<Vec<NewFormQuestion>, TicketError> {
    if texts.len() > MAX_QUESTIONS {
        return Err(TicketError::TooManyQuestions);
    }
    Ok(texts
        .iter()
        .enumerate()
        .map(|(i, text)| NewFormQuestion {
            guild_id,
            question_order: i as i32 + 1,
            question_text: text.clone(),
        })
        .collect())
}

/// Replaces the guild's question set, failing on more than
/// [`MAX_QUESTIONS`] texts without touching the stored set
pub async fn setup_form_questions(
    db: &mut AsyncMysqlConnection,
    guild_id: u64,
    texts: &[String],
) -> Result<Vec<NewFormQuestion>> {
    let questions = build_question_set(guild_id, texts)?;
    ticket_db::save_form_questions(db, guild_id, questions.clone()).await?;
    Ok(questions)
}

pub fn ticket_channel_name(user_name: &str) -> String {
    format!("{TICKET_CHANNEL_PREFIX}{}", user_name.to_lowercase())
}

/// Creates the private ticket channel and its backing row.
///
/// The channel is visible to the requesting user, the bot, and every stored
/// ticket role; `@everyone` is denied. A serenity error here (typically a
/// missing Manage Channels permission) propagates distinctly from a storage
/// error. If the row insert fails after the channel already exists, the
/// channel is deleted best-effort so we do not leak an orphan; the residual
/// risk of a crash between the two steps is accepted.
pub async fn create_simple_ticket(
    ctx: &serenity::Context,
    db: &mut AsyncMysqlConnection,
    guild_id: GuildId,
    user: &User,
) -> Result<(GuildChannel, u64)> {
    let member_perms =
        Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::READ_MESSAGE_HISTORY;
    let mut overwrites = vec![
        // @everyone shares its id with the guild
        PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::VIEW_CHANNEL,
            kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
        },
        PermissionOverwrite {
            allow: member_perms,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(user.id),
        },
        PermissionOverwrite {
            allow: member_perms,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(ctx.cache.current_user().id),
        },
    ];
    for ticket_role in ticket_db::get_ticket_roles(db, guild_id.get()).await? {
        overwrites.push(PermissionOverwrite {
            allow: member_perms,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Role(RoleId::new(ticket_role.role_id)),
        });
    }

    let channel = guild_id
        .create_channel(
            ctx.http(),
            CreateChannel::new(ticket_channel_name(user.display_name()))
                .kind(ChannelType::Text)
                .permissions(overwrites),
        )
        .await?;

    let ticket = NewTicket {
        guild_id: guild_id.get(),
        user_id: user.id.get(),
        channel_id: channel.id.get(),
        ticket_type: TicketType::Simple.as_str().to_string(),
        status: TicketStatus::Open.as_str().to_string(),
    };
    let ticket_id = match ticket_db::create_ticket(db, &ticket).await {
        Ok(ticket_id) => ticket_id,
        Err(e) => {
            // Compensate for the channel that now exists without a row
            if let Err(delete_err) = channel.delete(ctx.http()).await {
                warn!(
                    "Failed to delete orphan ticket channel {}: {delete_err}",
                    channel.id
                );
            }
            return Err(e);
        }
    };
    info!(
        "Opened simple ticket {ticket_id} in guild {guild_id} for user {}",
        user.id
    );
    Ok((channel, ticket_id))
}

/// Inserts the ticket row and its form responses in one transaction.
///
/// When the guild has no target channel configured the ticket row stores
/// `channel_id = 0` rather than NULL; downstream code treats 0 as "no
/// backing channel".
pub async fn create_form_ticket(
    db: &mut AsyncMysqlConnection,
    guild_id: u64,
    user_id: u64,
    settings: &GuildSettings,
    responses: Vec<CollectedResponse>,
) -> Result<u64> {
    let ticket = NewTicket {
        guild_id,
        user_id,
        channel_id: settings.target_channel_id.unwrap_or(0),
        ticket_type: TicketType::Form.as_str().to_string(),
        status: TicketStatus::Open.as_str().to_string(),
    };
    let ticket_id = db
        .transaction::<_, anyhow::Error, _>(|db| {
            async move {
                let ticket_id = ticket_db::create_ticket(db, &ticket).await?;
                ticket_db::save_form_responses(db, ticket_id, &responses).await?;
                Ok(ticket_id)
            }
            .scope_boxed()
        })
        .await?;
    info!("Opened form ticket {ticket_id} in guild {guild_id} for user {user_id}");
    Ok(ticket_id)
}

/// Flips an open ticket to closed and returns the updated record. Returns
/// `None` when the channel is not a ticket or the ticket is already closed;
/// both are no-ops, not errors, so closing twice is harmless.
pub async fn close_ticket(
    db: &mut AsyncMysqlConnection,
    channel_id: u64,
) -> Result<Option<Ticket>> {
    let Some(mut ticket) = ticket_db::get_ticket_by_channel(db, channel_id).await? else {
        return Ok(None);
    };
    if !ticket.is_open() {
        return Ok(None);
    }
    ticket_db::close_ticket(db, ticket.id).await?;
    ticket.status = TicketStatus::Closed.as_str().to_string();
    info!("Closed ticket {} in guild {}", ticket.id, ticket.guild_id);
    Ok(Some(ticket))
}

#[cfg(test)]
mod tests {
    use super::{build_question_set, ticket_channel_name};
    use crate::error::TicketError;
    use crate::services::tickets::MAX_QUESTIONS;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("question {i}")).collect()
    }

    #[test]
    fn question_orders_are_dense_and_one_based() {
        let qs = build_question_set(1, &texts(3)).unwrap();
        assert_eq!(
            qs.iter().map(|q| q.question_order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(qs[0].question_text, "question 0");
        assert!(qs.iter().all(|q| q.guild_id == 1));
    }

    #[test]
    fn question_cap_is_enforced() {
        assert!(build_question_set(1, &texts(MAX_QUESTIONS)).is_ok());
        assert!(matches!(
            build_question_set(1, &texts(MAX_QUESTIONS + 1)),
            Err(TicketError::TooManyQuestions)
        ));
    }

    #[test]
    fn channel_names_are_prefixed_and_lowercased() {
        assert_eq!(ticket_channel_name("Alice"), "ticket-alice");
    }
}
