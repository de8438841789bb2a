use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{Bigint, Nullable, Text, Unsigned};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncMysqlConnection, RunQueryDsl};
use serde::Deserialize;

/// Typed CRUD over the ticket tables. Every function maps 1:1 to a
/// parameterized statement; authorization and cross-entity validation live
/// in [`super::ticket_service`], never here. Storage errors propagate
/// unchanged.

diesel::define_sql_function! {
    fn last_insert_id() -> Unsigned<Bigint>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketType {
    Simple,
    Form,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Simple => "simple",
            TicketType::Form => "form",
        }
    }
}

impl FromStr for TicketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(TicketType::Simple),
            "form" => Ok(TicketType::Form),
            other => Err(format!("unknown ticket type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Deserialize)]
#[diesel(table_name = crate::schema::guild_settings)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct GuildSettings {
    pub guild_id: u64,
    pub ticket_type: String,
    pub welcome_message: String,
    pub target_channel_id: Option<u64>,
}

impl GuildSettings {
    pub fn ticket_type(&self) -> Result<TicketType> {
        TicketType::from_str(&self.ticket_type).map_err(anyhow::Error::msg)
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::form_questions)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct FormQuestion {
    pub id: u64,
    pub guild_id: u64,
    pub question_order: i32,
    pub question_text: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::form_questions)]
pub struct NewFormQuestion {
    pub guild_id: u64,
    pub question_order: i32,
    pub question_text: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::ticket_roles)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct TicketRole {
    pub id: u64,
    pub guild_id: u64,
    pub role_id: u64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::tickets)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct Ticket {
    pub id: u64,
    pub guild_id: u64,
    pub user_id: u64,
    pub channel_id: u64,
    pub ticket_type: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
    pub closed_at: Option<chrono::NaiveDateTime>,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open.as_str()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::tickets)]
pub struct NewTicket {
    pub guild_id: u64,
    pub user_id: u64,
    pub channel_id: u64,
    pub ticket_type: String,
    pub status: String,
}

/// Answer captured by the form sequencer before any ticket row exists
#[derive(Debug, Clone)]
pub struct CollectedResponse {
    pub question_order: i32,
    pub question_text: String,
    pub response_text: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::form_responses)]
pub struct NewFormResponse {
    pub ticket_id: u64,
    pub question_order: i32,
    pub question_text: String,
    pub response_text: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::co_owners)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct CoOwner {
    pub id: u64,
    pub guild_id: u64,
    pub user_id: u64,
    pub assigned_by: u64,
}

// --- Guild settings ---

pub async fn get_guild_settings(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
) -> Result<Option<GuildSettings>> {
    use crate::schema::guild_settings::dsl::*;
    Ok(guild_settings
        .filter(guild_id.eq(in_guild_id))
        .select(GuildSettings::as_select())
        .first::<GuildSettings>(db)
        .await
        .optional()?)
}

/// Upsert by primary key; always refreshes `updated_at`
pub async fn save_guild_settings(
    db: &mut AsyncMysqlConnection,
    settings: &GuildSettings,
) -> Result<()> {
    diesel::sql_query(
        "INSERT INTO guild_settings (guild_id, ticket_type, welcome_message, target_channel_id) \
         VALUES (?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE \
         ticket_type = VALUES(ticket_type), welcome_message = VALUES(welcome_message), \
         target_channel_id = VALUES(target_channel_id), updated_at = CURRENT_TIMESTAMP",
    )
    .bind::<Unsigned<Bigint>, _>(settings.guild_id)
    .bind::<Text, _>(&settings.ticket_type)
    .bind::<Text, _>(&settings.welcome_message)
    .bind::<Nullable<Unsigned<Bigint>>, _>(settings.target_channel_id)
    .execute(db)
    .await?;
    Ok(())
}

// --- Form questions ---

pub async fn get_form_questions(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
) -> Result<Vec<FormQuestion>> {
    use crate::schema::form_questions::dsl::*;
    Ok(form_questions
        .filter(guild_id.eq(in_guild_id))
        .order_by(question_order)
        .select(FormQuestion::as_select())
        .load::<FormQuestion>(db)
        .await?)
}

/// Replaces the guild's whole question set. Delete and inserts run in one
/// transaction so a failure cannot leave the set half-replaced.
pub async fn save_form_questions(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
    questions: Vec<NewFormQuestion>,
) -> Result<()> {
    db.transaction::<_, anyhow::Error, _>(|db| {
        async move {
            use crate::schema::form_questions::dsl::*;
            diesel::delete(form_questions.filter(guild_id.eq(in_guild_id)))
                .execute(db)
                .await?;
            diesel::insert_into(form_questions)
                .values(&questions)
                .execute(db)
                .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

// --- Ticket roles ---

pub async fn get_ticket_roles(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
) -> Result<Vec<TicketRole>> {
    use crate::schema::ticket_roles::dsl::*;
    Ok(ticket_roles
        .filter(guild_id.eq(in_guild_id))
        .select(TicketRole::as_select())
        .load::<TicketRole>(db)
        .await?)
}

/// Idempotent add, duplicate rows are ignored
pub async fn add_ticket_role(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
    in_role_id: u64,
) -> Result<()> {
    diesel::sql_query("INSERT IGNORE INTO ticket_roles (guild_id, role_id) VALUES (?, ?)")
        .bind::<Unsigned<Bigint>, _>(in_guild_id)
        .bind::<Unsigned<Bigint>, _>(in_role_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Returns whether a row actually existed
pub async fn remove_ticket_role(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
    in_role_id: u64,
) -> Result<bool> {
    use crate::schema::ticket_roles::dsl::*;
    let affected = diesel::delete(
        ticket_roles
            .filter(guild_id.eq(in_guild_id))
            .filter(role_id.eq(in_role_id)),
    )
    .execute(db)
    .await?;
    Ok(affected > 0)
}

// --- Tickets ---

pub async fn create_ticket(db: &mut AsyncMysqlConnection, ticket: &NewTicket) -> Result<u64> {
    use crate::schema::tickets::dsl::*;
    diesel::insert_into(tickets).values(ticket).execute(db).await?;
    Ok(diesel::select(last_insert_id()).first::<u64>(db).await?)
}

/// The sole mechanism for deciding "is this channel a ticket"
pub async fn get_ticket_by_channel(
    db: &mut AsyncMysqlConnection,
    in_channel_id: u64,
) -> Result<Option<Ticket>> {
    use crate::schema::tickets::dsl::*;
    Ok(tickets
        .filter(channel_id.eq(in_channel_id))
        .select(Ticket::as_select())
        .first::<Ticket>(db)
        .await
        .optional()?)
}

/// Unconditional status flip + timestamp; the open-state guard lives in the
/// service layer
pub async fn close_ticket(db: &mut AsyncMysqlConnection, ticket_id: u64) -> Result<()> {
    use crate::schema::tickets::dsl::*;
    diesel::update(tickets.filter(id.eq(ticket_id)))
        .set((
            status.eq(TicketStatus::Closed.as_str()),
            closed_at.eq(Utc::now().naive_utc()),
        ))
        .execute(db)
        .await?;
    Ok(())
}

// --- Form responses ---

pub async fn save_form_responses(
    db: &mut AsyncMysqlConnection,
    in_ticket_id: u64,
    responses: &[CollectedResponse],
) -> Result<()> {
    use crate::schema::form_responses::dsl::*;
    let rows: Vec<NewFormResponse> = responses
        .iter()
        .map(|r| NewFormResponse {
            ticket_id: in_ticket_id,
            question_order: r.question_order,
            question_text: r.question_text.clone(),
            response_text: r.response_text.clone(),
        })
        .collect();
    diesel::insert_into(form_responses)
        .values(&rows)
        .execute(db)
        .await?;
    Ok(())
}

// --- Co-owners ---

pub async fn get_co_owners(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
) -> Result<Vec<CoOwner>> {
    use crate::schema::co_owners::dsl::*;
    Ok(co_owners
        .filter(guild_id.eq(in_guild_id))
        .select(CoOwner::as_select())
        .load::<CoOwner>(db)
        .await?)
}

/// Idempotent add, duplicate rows are ignored
pub async fn add_co_owner(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
    in_user_id: u64,
    in_assigned_by: u64,
) -> Result<()> {
    diesel::sql_query("INSERT IGNORE INTO co_owners (guild_id, user_id, assigned_by) VALUES (?, ?, ?)")
        .bind::<Unsigned<Bigint>, _>(in_guild_id)
        .bind::<Unsigned<Bigint>, _>(in_user_id)
        .bind::<Unsigned<Bigint>, _>(in_assigned_by)
        .execute(db)
        .await?;
    Ok(())
}

/// Returns whether a row actually existed
pub async fn remove_co_owner(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
    in_user_id: u64,
) -> Result<bool> {
    use crate::schema::co_owners::dsl::*;
    let affected = diesel::delete(
        co_owners
            .filter(guild_id.eq(in_guild_id))
            .filter(user_id.eq(in_user_id)),
    )
    .execute(db)
    .await?;
    Ok(affected > 0)
}

pub async fn is_co_owner(
    db: &mut AsyncMysqlConnection,
    in_guild_id: u64,
    in_user_id: u64,
) -> Result<bool> {
    use crate::schema::co_owners::dsl::*;
    let entry = co_owners
        .filter(guild_id.eq(in_guild_id))
        .filter(user_id.eq(in_user_id))
        .select(id)
        .first::<u64>(db)
        .await
        .optional()?;
    Ok(entry.is_some())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Ticket, TicketStatus, TicketType};

    #[test]
    fn ticket_type_parses_case_insensitively() {
        assert_eq!(TicketType::from_str("simple").unwrap(), TicketType::Simple);
        assert_eq!(TicketType::from_str("Form").unwrap(), TicketType::Form);
        assert!(TicketType::from_str("thread").is_err());
    }

    #[test]
    fn ticket_type_round_trips_through_as_str() {
        for ty in [TicketType::Simple, TicketType::Form] {
            assert_eq!(TicketType::from_str(ty.as_str()).unwrap(), ty);
        }
    }

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(TicketStatus::Open.as_str(), "open");
        assert_eq!(TicketStatus::Closed.as_str(), "closed");
    }

    fn ticket_with_status(status: &str) -> Ticket {
        Ticket {
            id: 1,
            guild_id: 100,
            user_id: 200,
            channel_id: 300,
            ticket_type: TicketType::Simple.as_str().to_string(),
            status: status.to_string(),
            created_at: chrono::DateTime::UNIX_EPOCH.naive_utc(),
            closed_at: None,
        }
    }

    #[test]
    fn open_tickets_report_as_open() {
        assert!(ticket_with_status("open").is_open());
        assert!(!ticket_with_status("closed").is_open());
    }
}
