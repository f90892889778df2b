use poise::{
    serenity_prelude::{self as serenity},
    BoxFuture, FrameworkError,
};

use thiserror::Error as ThisError;
use tracing::{error, error_span, warn, Instrument};

use crate::{select::SelectError, utils::poise::ContextExt, Data};

pub fn handle_framework_error(err: FrameworkError<'_, Data, CommandError>) -> BoxFuture<'_, ()> {
    Box::pin(async {
        match err {
            FrameworkError::Command { error, ctx, .. } => {
                let command = ctx.invoked_command_name();
                let span = error_span!("", command);

                async {
                    error!("{error}");

                    if let Err(send) = ctx.reply_ext(error.to_string()).await {
                        error!("failed to report the error in channel: {send}");
                    }
                }
                .instrument(span)
                .await;
            }
            FrameworkError::MissingBotPermissions {
                missing_permissions,
                ctx,
                ..
            } => {
                let command = ctx.invoked_command_name();
                let span = error_span!("", command);
                let _enter = span.enter();

                error!(%missing_permissions, "bot is missing permissions");
            }
            FrameworkError::CooldownHit {
                remaining_cooldown,
                ctx,
                ..
            } => {
                let reply = format!(
                    "slow down! try again in {} seconds",
                    remaining_cooldown.as_secs().max(1)
                );

                if let Err(send) = ctx.reply_ext(reply).await {
                    warn!("failed to report cooldown: {send}");
                }
            }
            _ => {
                if let Err(err) = poise::builtins::on_error(err).await {
                    error!("failed to handle framework error: {err}");
                }
            }
        };
    })
}

#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("discord error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("http error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("error from anilist: {0}")]
    AniList(#[from] crate::api::anilist::Error),

    #[error("error from myanimelist: {0}")]
    Mal(#[from] crate::api::mal::Error),

    #[error("error from pixiv: {0}")]
    Pixiv(#[from] crate::api::pixiv::Error),

    #[error("error from the config store: {0}")]
    Store(#[from] crate::store::Error),

    #[error("error from event handler: {0}")]
    EventHandler(#[from] crate::framework::event_handler::HandlerError),
}

/// Lets commands drive a selection dialog with `?`: provider failures are
/// already `CommandError`s, transport failures come from serenity.
impl From<SelectError<CommandError, serenity::Error>> for CommandError {
    fn from(err: SelectError<CommandError, serenity::Error>) -> Self {
        match err {
            SelectError::Source(source) => source,
            SelectError::Transport(transport) => Self::Serenity(transport),
        }
    }
}
