use std::collections::HashSet;
use std::env::var;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use diesel_migrations::{EmbeddedMigrations, MigrationHarness};
use dotenv::dotenv;
use log::{error, info};
use poise::PrefixFrameworkOptions;
use poise::{serenity_prelude as serenity, CreateReply, Framework, FrameworkContext};

use crate::embeds::{default_embed, EmbedColor};
use crate::services::tickets::form_flow::FormSessions;
use crate::services::tickets::ticket_commands::{handle_close_button, CLOSE_BUTTON_ID};
use crate::services::tickets::DEFAULT_FORM_TIMEOUT_SECONDS;

mod db;
mod discord;
mod embeds;
pub mod error;
pub mod schema;
mod services;

#[derive(Debug, Clone)]
pub struct Data {
    /// Users with an in-flight form session; see [`services::tickets::form_flow`]
    active_forms: FormSessions,
    form_timeout: Duration,
}

async fn on_error(error: poise::FrameworkError<'_, Data, anyhow::Error>) {
    // This is our custom error handler
    // They are many errors that can occur, so we only handle the ones we want to customize
    // and forward the rest to the default handler
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {:?}", error),
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!("Error in command `{}`: {:?}", ctx.command().name, error);
            // Whatever went wrong, the invoking user still gets a response
            if let Err(e) = ctx
                .send(
                    CreateReply::default().ephemeral(true).embed(
                        default_embed(EmbedColor::Error)
                            .description("Something went wrong while handling your command."),
                    ),
                )
                .await
            {
                log::error!("Error while reporting command failure: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                log::error!("Error while handling error: {}", e)
            }
        }
    }
}

pub const MIGRATIONS: EmbeddedMigrations = diesel_migrations::embed_migrations!("./migrations");

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    {
        let mut db = db::establish_sync_db_connection().expect("Database is not reachable");
        db.run_pending_migrations(MIGRATIONS)
            .expect("Failed to run pending migrations");
    }

    #[allow(deprecated)]
    let options = poise::FrameworkOptions {
        commands: vec![
            services::tickets::setup_commands::ticket_setup(),
            services::tickets::setup_commands::ticket_questions(),
            services::tickets::setup_commands::ticket_roles(),
            services::tickets::setup_commands::ticket_status(),
            services::tickets::ticket_commands::ticket(),
            services::tickets::ticket_commands::close_ticket(),
            services::tickets::admin_commands::add_co_owner(),
            services::tickets::admin_commands::remove_co_owner(),
            services::tickets::admin_commands::list_co_owners(),
        ],
        on_error: |error| Box::pin(on_error(error)),
        pre_command: |ctx| {
            Box::pin(async move {
                info!("Executing command {}...", ctx.command().qualified_name);
            })
        },
        post_command: |ctx| {
            Box::pin(async move {
                info!("Executed command {}!", ctx.command().qualified_name);
            })
        },
        command_check: None,
        skip_checks_for_owners: false,
        allowed_mentions: None,
        reply_callback: None,
        manual_cooldowns: false,
        require_cache_for_guild_check: false,
        event_handler: |ctx: &serenity::Context,
                        event: &serenity::FullEvent,
                        _framework: FrameworkContext<Data, anyhow::Error>,
                        _data| {
            Box::pin(async move {
                if let serenity::FullEvent::InteractionCreate {
                    interaction: serenity::Interaction::Component(component),
                } = event
                {
                    if component.data.custom_id == CLOSE_BUTTON_ID {
                        if let Err(e) = handle_close_button(ctx, component).await {
                            error!("Error while handling close button: {e}");
                        }
                    }
                }
                Ok(())
            })
        },
        listener: (),
        prefix_options: PrefixFrameworkOptions {
            prefix: None,
            additional_prefixes: vec![],
            dynamic_prefix: None,
            stripped_dynamic_prefix: None,
            mention_as_prefix: false,
            edit_tracker: None,
            execute_untracked_edits: false,
            ignore_edits_if_not_yet_responded: false,
            execute_self_messages: false,
            ignore_bots: false,
            ignore_thread_creation: false,
            case_insensitive_commands: false,
            non_command_message: None,
            __non_exhaustive: (),
        },
        owners: Default::default(),
        initialize_owners: false,
        initialized_team_roles: None,
        __non_exhaustive: (),
    };

    let framework = Framework::builder()
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Data initialization complete!");
                Ok(Data {
                    active_forms: Arc::new(Mutex::new(HashSet::new())),
                    form_timeout: Duration::from_secs(
                        var("FORM_TIMEOUT_SECONDS")
                            .ok()
                            .and_then(|secs| secs.parse().ok())
                            .unwrap_or(DEFAULT_FORM_TIMEOUT_SECONDS),
                    ),
                })
            })
        })
        .options(options)
        .build();

    let token = var("DISCORD_TOKEN").expect("Missing `DISCORD_TOKEN` env var");
    let intents = serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::non_privileged();

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await;

    client.unwrap().start().await.unwrap()
}
