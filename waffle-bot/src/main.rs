mod events;
mod platform;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rustls::crypto::ring::default_provider;
use sqlx::postgres::PgPoolOptions;

use waffle_core::{Data, Error};
use waffle_database::cache::DEFAULT_SETTINGS_CACHE_TTL;
use waffle_database::{CacheService, RecordStore, Settings};
use waffle_moderation::{
    AuditLog, Platform, PunishmentManager, RankError, ReactionRoleEngine, ReputationBoard,
};
use waffle_utils::delay::DelayScheduler;

use crate::platform::SerenityPlatform;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    dotenvy::dotenv().ok();

    let token = env::var("DISCORD_TOKEN")?;
    let guild_id = env::var("DISCORD_GUILD_ID")?.parse::<u64>()?;

    let store = connect_store().await?;
    let cache = settings_cache().await;

    let settings = Settings::setup(&store, cache).await?;
    info!(durable = store.is_durable(), "Settings table ready.");

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: waffle_commands::commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handle_event(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(waffle_utils::COMMAND_PREFIX.to_string()),
                mention_as_prefix: false,
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let store = store.clone();
            let settings = settings.clone();
            Box::pin(async move {
                info!("Waffle has awoken!");

                poise::builtins::register_in_guild(
                    ctx,
                    &framework.options().commands,
                    serenity::GuildId::new(guild_id),
                )
                .await?;

                let platform: Arc<dyn Platform> =
                    Arc::new(SerenityPlatform::new(ctx.http.clone(), ready.user.id));
                let audit = AuditLog::new(settings.clone(), platform.clone());
                let punishments = PunishmentManager::setup(
                    &store,
                    settings.clone(),
                    platform.clone(),
                    audit.clone(),
                    DelayScheduler::new(),
                )
                .await?;
                let reaction_roles = ReactionRoleEngine::setup(&store, platform.clone()).await?;
                let reputation = ReputationBoard::setup(&store).await?;

                let armed = punishments.start_tracking().await?;
                info!(armed, "Punishment tracking started.");

                Ok(Data {
                    settings,
                    punishments,
                    reaction_roles,
                    reputation,
                    audit,
                    platform,
                })
            })
        })
        .build();

    info!("Waffle is connecting...");

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        if *metadata.level() > tracing::Level::INFO {
            return false;
        }

        let target = metadata.target();
        !(target.starts_with("serenity::gateway::bridge::shard_manager")
            || target.starts_with("serenity::gateway::bridge::shard_runner"))
    }));

    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Postgres when `DATABASE_URL` is set, otherwise a process-local store.
async fn connect_store() -> anyhow::Result<RecordStore> {
    let Ok(database_url) = env::var("DATABASE_URL") else {
        warn!("DATABASE_URL is not set; using the in-memory store. Nothing will survive a restart.");
        return Ok(RecordStore::memory());
    };

    let max_connections = u32::try_from(env_u64("DATABASE_MAX_CONNECTIONS", 5)).unwrap_or(5);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await?;
    info!(max_connections, "PostgreSQL connection established.");

    Ok(RecordStore::postgres(pool))
}

/// Redis-backed settings cache, falling back to no cache on any setup problem.
async fn settings_cache() -> CacheService {
    let key_prefix = env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "waffle:prod".to_string());
    let ttl = Duration::from_secs(env_u64(
        "SETTINGS_CACHE_TTL_SECONDS",
        DEFAULT_SETTINGS_CACHE_TTL.as_secs(),
    ));

    if !env_bool("REDIS_ENABLED", false) {
        info!("Redis cache disabled (set REDIS_ENABLED=true to enable).");
        return CacheService::disabled(key_prefix);
    }

    let Ok(redis_url) = env::var("REDIS_URL") else {
        warn!(%key_prefix, "REDIS_ENABLED=true but REDIS_URL is missing; continuing without a cache.");
        return CacheService::disabled(key_prefix);
    };

    let cache = match CacheService::redis(&redis_url, key_prefix.clone()) {
        Ok(cache) => cache.with_ttl(ttl),
        Err(err) => {
            warn!(?err, %key_prefix, "Failed to initialize Redis cache; continuing without a cache.");
            return CacheService::disabled(key_prefix);
        }
    };

    match cache.ping().await {
        Ok(()) => info!(%key_prefix, ttl_seconds = ttl.as_secs(), "Redis settings cache enabled."),
        Err(err) => warn!(?err, "Redis ping failed; reads will fall back to the datastore."),
    }

    cache
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let reply = match error.downcast_ref::<RankError>() {
                Some(rank) => rank.to_string(),
                None => {
                    error!(?error, "command error");
                    "Something went wrong while running this command.".to_owned()
                }
            };

            let _ = ctx
                .send(poise::CreateReply::default().ephemeral(true).content(reply))
                .await;
        }
        poise::FrameworkError::ArgumentParse { ctx, input, .. } => {
            let usage = format!("Usage: `!{}`", ctx.command().qualified_name);
            let description = if let Some(input) = input {
                format!("Invalid argument: `{}`\n{}", input, usage)
            } else {
                format!("Missing required argument.\n{}", usage)
            };

            let _ = ctx.say(description).await;
        }
        poise::FrameworkError::UnknownCommand { .. } => {
            debug!("unknown command invocation");
        }
        other => {
            error!(?other, "framework error");
        }
    }
}

async fn handle_event(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            events::reaction_roles::handle_reaction_add(data, add_reaction).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            events::member_join::handle_member_join(data, new_member).await;
        }
        _ => {}
    }

    Ok(())
}
