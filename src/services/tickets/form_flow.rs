use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::warn;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{ChannelId, CreateMessage, UserId};
use poise::{Context, CreateReply};

use crate::embeds::{default_embed, form_transcript_embed, EmbedColor};
use crate::error::TicketError;
use crate::services::tickets::ticket_db::{CollectedResponse, FormQuestion, GuildSettings};
use crate::services::tickets::ticket_service;
use crate::Data;

/// The multi-step form flow: ask each configured question in turn, wait for
/// the author's reply or a timeout, and persist the ticket plus transcript
/// only once every question is answered. A timeout discards everything.

/// Users with a form session in flight. Held in process memory; a restart
/// clears all sessions.
pub type FormSessions = Arc<Mutex<HashSet<UserId>>>;

/// Mutual exclusion per (process, user): at most one in-flight form session
/// each. Dropping the guard releases the slot, so every exit path of the
/// sequencer (completion, timeout, error) clears the marker.
pub struct FormSessionGuard {
    sessions: FormSessions,
    user_id: UserId,
}

impl FormSessionGuard {
    pub fn acquire(sessions: &FormSessions, user_id: UserId) -> Result<Self, TicketError> {
        let mut active = sessions
            .lock()
            .map_err(|_| TicketError::PoisonedSessions)?;
        if !active.insert(user_id) {
            return Err(TicketError::FormInProgress);
        }
        Ok(Self {
            sessions: Arc::clone(sessions),
            user_id,
        })
    }
}

impl Drop for FormSessionGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.sessions.lock() {
            active.remove(&self.user_id);
        }
    }
}

fn question_embed(order: i32, total: usize, text: &str) -> serenity::CreateEmbed {
    default_embed(EmbedColor::Info)
        .title(format!("Question {order}/{total}"))
        .description(text.to_string())
}

/// Asks every question one at a time. Returns `None` when the user let a
/// question time out; partial answers are discarded by the caller.
async fn collect_responses(
    ctx: Context<'_, Data, anyhow::Error>,
    questions: &[FormQuestion],
) -> Result<Option<Vec<CollectedResponse>>> {
    let timeout = ctx.data().form_timeout;
    let mut responses: Vec<CollectedResponse> = Vec::with_capacity(questions.len());
    for question in questions {
        // DM first; if the user blocks DMs, fall back to prompting in the
        // invoking context and accept a reply from any channel.
        let dm_channel = crate::discord::send_dm_safely(
            ctx.serenity_context(),
            ctx.author(),
            question_embed(
                question.question_order,
                questions.len(),
                &format!(
                    "{}\n\n*Please respond to this message.*",
                    question.question_text
                ),
            ),
        )
        .await;
        if dm_channel.is_none() {
            ctx.send(
                CreateReply::default().ephemeral(true).embed(question_embed(
                    question.question_order,
                    questions.len(),
                    &format!(
                        "{}\n\n*I couldn't DM you, please respond here.*",
                        question.question_text
                    ),
                )),
            )
            .await?;
        }

        let mut collector = serenity::MessageCollector::new(ctx.serenity_context())
            .author_id(ctx.author().id)
            .timeout(timeout);
        if let Some(dm_channel) = dm_channel {
            collector = collector.channel_id(dm_channel);
        }
        match collector.next().await {
            Some(reply) => responses.push(CollectedResponse {
                question_order: question.question_order,
                question_text: question.question_text.clone(),
                response_text: reply.content.clone(),
            }),
            None => return Ok(None),
        }
    }
    Ok(Some(responses))
}

/// Runs a full form session for the invoking user. The caller has already
/// acquired the [`FormSessionGuard`] and verified that questions exist.
pub async fn run_form_session(
    ctx: Context<'_, Data, anyhow::Error>,
    settings: &GuildSettings,
    questions: &[FormQuestion],
) -> Result<()> {
    ctx.send(
        CreateReply::default().ephemeral(true).embed(
            default_embed(EmbedColor::Info)
                .title("Ticket Form")
                .description(format!(
                    "I'll ask you {} questions, one at a time. You have {} minutes to answer each.",
                    questions.len(),
                    ctx.data().form_timeout.as_secs() / 60,
                )),
        ),
    )
    .await?;

    let responses = match collect_responses(ctx, questions).await? {
        Some(responses) => responses,
        None => {
            // Normal termination: nothing is persisted
            ctx.send(
                CreateReply::default().ephemeral(true).embed(
                    default_embed(EmbedColor::Error)
                        .title("Form Timeout")
                        .description("You took too long to respond. Please start over."),
                ),
            )
            .await?;
            return Ok(());
        }
    };

    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| anyhow::anyhow!("form session outside a guild"))?;
    let mut db = crate::db::establish_db_connection().await?;
    let ticket_id = ticket_service::create_form_ticket(
        &mut db,
        guild_id.get(),
        ctx.author().id.get(),
        settings,
        responses.clone(),
    )
    .await?;

    if let Some(target_channel_id) = settings.target_channel_id {
        let transcript = form_transcript_embed(ctx.author(), &responses)
            .field("Ticket ID", ticket_id.to_string(), true);
        if let Err(e) = ChannelId::new(target_channel_id)
            .send_message(ctx.http(), CreateMessage::new().embed(transcript))
            .await
        {
            warn!("Failed to deliver form transcript to channel {target_channel_id}: {e}");
        }
    }

    ctx.send(
        CreateReply::default().ephemeral(true).embed(
            default_embed(EmbedColor::Success)
                .title("Form Submitted")
                .description(format!(
                    "Your ticket form has been submitted.\n**Ticket ID:** {ticket_id}"
                )),
        ),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use poise::serenity_prelude::UserId;

    use super::{FormSessionGuard, FormSessions};
    use crate::error::TicketError;

    #[test]
    fn second_session_for_same_user_is_rejected() {
        let sessions: FormSessions = Arc::new(Mutex::new(HashSet::new()));
        let user = UserId::new(42);
        let guard = FormSessionGuard::acquire(&sessions, user).unwrap();
        assert!(matches!(
            FormSessionGuard::acquire(&sessions, user),
            Err(TicketError::FormInProgress)
        ));
        // The first session is untouched by the rejected attempt
        assert!(sessions.lock().unwrap().contains(&user));
        drop(guard);
    }

    #[test]
    fn sessions_for_different_users_coexist() {
        let sessions: FormSessions = Arc::new(Mutex::new(HashSet::new()));
        let _a = FormSessionGuard::acquire(&sessions, UserId::new(1)).unwrap();
        let _b = FormSessionGuard::acquire(&sessions, UserId::new(2)).unwrap();
        assert_eq!(sessions.lock().unwrap().len(), 2);
    }

    #[test]
    fn dropping_the_guard_frees_the_slot() {
        let sessions: FormSessions = Arc::new(Mutex::new(HashSet::new()));
        let user = UserId::new(7);
        {
            let _guard = FormSessionGuard::acquire(&sessions, user).unwrap();
        }
        // A fresh session is accepted afterwards
        let _guard = FormSessionGuard::acquire(&sessions, user).unwrap();
    }
}
