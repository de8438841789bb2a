use anyhow::Result;
use poise::{Context, CreateReply};

use crate::db::establish_db_connection;
use crate::embeds::{default_embed, truncate_text, EmbedColor};
use crate::error::TicketError;
use crate::services::tickets::ticket_db::{self, TicketType};
use crate::services::tickets::ticket_service;
use crate::Data;

/// Guild configuration commands: settings, form questions, access roles and
/// the read-only status summary. All of them require owner/co-owner
/// authorization.

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum TicketTypeChoice {
    #[name = "simple"]
    Simple,
    #[name = "form"]
    Form,
}

impl From<TicketTypeChoice> for TicketType {
    fn from(choice: TicketTypeChoice) -> Self {
        match choice {
            TicketTypeChoice::Simple => TicketType::Simple,
            TicketTypeChoice::Form => TicketType::Form,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum RoleAction {
    #[name = "add"]
    Add,
    #[name = "remove"]
    Remove,
}

/// Owner-or-co-owner gate shared by every configuration command. Renders
/// the denial itself and returns whether the caller may proceed.
async fn check_authorized(ctx: Context<'_, Data, anyhow::Error>) -> Result<bool> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };
    let mut db = establish_db_connection().await?;
    if ticket_service::is_authorized(ctx.serenity_context(), &mut db, guild_id, ctx.author().id)
        .await?
    {
        return Ok(true);
    }
    ctx.send(
        CreateReply::default().ephemeral(true).embed(
            default_embed(EmbedColor::Error)
                .title("Access Denied")
                .description("Only the server owner or co-owners can use this command."),
        ),
    )
    .await?;
    Ok(false)
}

/// Splits `;`-separated question input, trimming whitespace and dropping
/// empty segments
pub fn parse_question_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

/// Configure the ticket system for this server
#[poise::command(slash_command, rename = "ticket-setup", guild_only)]
pub async fn ticket_setup(
    ctx: Context<'_, Data, anyhow::Error>,
    #[description = "Type of ticket system"] ticket_type: TicketTypeChoice,
    #[description = "Welcome message for new tickets"] welcome_message: String,
    #[description = "Channel for form submissions (required for form type)"]
    #[channel_types("Text")]
    target_channel: Option<poise::serenity_prelude::GuildChannel>,
) -> Result<()> {
    if !check_authorized(ctx).await? {
        return Ok(());
    }
    let ticket_type = TicketType::from(ticket_type);
    // The service accepts already-validated input; this is the place the
    // form => target-channel rule is enforced.
    if ticket_type == TicketType::Form && target_channel.is_none() {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error)
                    .title("Target Channel Required")
                    .description(TicketError::MissingTargetChannel.to_string()),
            ),
        )
        .await?;
        return Ok(());
    }

    let mut db = establish_db_connection().await?;
    let settings = ticket_service::setup_guild_settings(
        &mut db,
        ctx.guild_id().unwrap().get(),
        ticket_type,
        welcome_message,
        target_channel.as_ref().map(|c| c.id.get()),
    )
    .await?;

    let mut embed = default_embed(EmbedColor::Success)
        .title("Ticket System Configured")
        .field("Ticket Type", ticket_type.as_str(), true)
        .field(
            "Welcome Message",
            truncate_text(&settings.welcome_message, 100),
            false,
        );
    if let Some(channel) = &target_channel {
        embed = embed.field("Target Channel", format!("<#{}>", channel.id), true);
    }
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Set up form questions for form-type tickets
#[poise::command(slash_command, rename = "ticket-questions", guild_only)]
pub async fn ticket_questions(
    ctx: Context<'_, Data, anyhow::Error>,
    #[description = "Questions separated by semicolons (;). Max 10 questions."] questions: String,
) -> Result<()> {
    if !check_authorized(ctx).await? {
        return Ok(());
    }
    let question_list = parse_question_list(&questions);
    if question_list.is_empty() {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error)
                    .title("No Questions Provided")
                    .description(TicketError::NoQuestions.to_string()),
            ),
        )
        .await?;
        return Ok(());
    }

    let mut db = establish_db_connection().await?;
    let saved = match ticket_service::setup_form_questions(
        &mut db,
        ctx.guild_id().unwrap().get(),
        &question_list,
    )
    .await
    {
        Ok(saved) => saved,
        Err(e) => match e.downcast_ref::<TicketError>() {
            Some(validation) => {
                ctx.send(
                    CreateReply::default().ephemeral(true).embed(
                        default_embed(EmbedColor::Error)
                            .title("Invalid Input")
                            .description(validation.to_string()),
                    ),
                )
                .await?;
                return Ok(());
            }
            None => return Err(e),
        },
    };

    let listing = saved
        .iter()
        .map(|q| format!("{}. {}", q.question_order, q.question_text))
        .collect::<Vec<_>>()
        .join("\n");
    ctx.send(
        CreateReply::default().embed(
            default_embed(EmbedColor::Success)
                .title("Form Questions Configured")
                .description(format!("Successfully configured {} questions.", saved.len()))
                // 1024 is discord's embed field value limit
                .field("Questions", truncate_text(&listing, 1024), false),
        ),
    )
    .await?;
    Ok(())
}

/// Manage roles that can access tickets
#[poise::command(slash_command, rename = "ticket-roles", guild_only)]
pub async fn ticket_roles(
    ctx: Context<'_, Data, anyhow::Error>,
    #[description = "Action to perform"] action: RoleAction,
    #[description = "Role to add or remove"] role: poise::serenity_prelude::Role,
) -> Result<()> {
    if !check_authorized(ctx).await? {
        return Ok(());
    }
    let guild_id = ctx.guild_id().unwrap().get();
    let mut db = establish_db_connection().await?;
    let embed = match action {
        RoleAction::Add => {
            ticket_db::add_ticket_role(&mut db, guild_id, role.id.get()).await?;
            default_embed(EmbedColor::Success)
                .title("Role Added")
                .description(format!("Role <@&{}> has been added to ticket access.", role.id))
        }
        RoleAction::Remove => {
            if ticket_db::remove_ticket_role(&mut db, guild_id, role.id.get()).await? {
                default_embed(EmbedColor::Success)
                    .title("Role Removed")
                    .description(format!(
                        "Role <@&{}> has been removed from ticket access.",
                        role.id
                    ))
            } else {
                default_embed(EmbedColor::Error)
                    .title("Role Not Found")
                    .description(format!(
                        "Role <@&{}> was not in the ticket access list.",
                        role.id
                    ))
            }
        }
    };
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// View current ticket system configuration
#[poise::command(slash_command, rename = "ticket-status", guild_only)]
pub async fn ticket_status(ctx: Context<'_, Data, anyhow::Error>) -> Result<()> {
    if !check_authorized(ctx).await? {
        return Ok(());
    }
    let guild_id = ctx.guild_id().unwrap().get();
    let mut db = establish_db_connection().await?;
    let Some(settings) = ticket_db::get_guild_settings(&mut db, guild_id).await? else {
        ctx.send(
            CreateReply::default().ephemeral(true).embed(
                default_embed(EmbedColor::Error).description(
                    "The ticket system has not been configured for this server. \
                     Use `/ticket-setup` to get started.",
                ),
            ),
        )
        .await?;
        return Ok(());
    };

    let roles = ticket_db::get_ticket_roles(&mut db, guild_id).await?;
    let questions = ticket_db::get_form_questions(&mut db, guild_id).await?;

    let mut embed = default_embed(EmbedColor::Info)
        .title("Ticket System Status")
        .field("Ticket Type", settings.ticket_type.clone(), true)
        .field(
            "Welcome Message",
            truncate_text(&settings.welcome_message, 100),
            false,
        );
    if let Some(target_channel_id) = settings.target_channel_id {
        embed = embed.field("Target Channel", format!("<#{target_channel_id}>"), true);
    }
    let role_list = if roles.is_empty() {
        "None configured".to_string()
    } else {
        roles
            .iter()
            .map(|r| format!("<@&{}>", r.role_id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    embed = embed.field("Ticket Access Roles", role_list, false);
    if settings.ticket_type()? == TicketType::Form {
        embed = embed.field(
            "Form Questions",
            format!("{} questions configured", questions.len()),
            true,
        );
    }
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_question_list;

    #[test]
    fn questions_are_split_and_trimmed() {
        assert_eq!(
            parse_question_list("Name? ; Issue?;  Steps to reproduce? "),
            vec!["Name?", "Issue?", "Steps to reproduce?"]
        );
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(parse_question_list(";;  ;"), Vec::<String>::new());
        assert_eq!(parse_question_list("only one;"), vec!["only one"]);
    }
}
