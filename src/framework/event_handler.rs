use std::{future::Future, pin::Pin};

use poise::{
    serenity_prelude::{self as serenity, CacheHttp, FullEvent, Message},
    FrameworkContext,
};
use regex::Regex;
use thiserror::Error;
use tracing::trace;

use crate::{errors::CommandError, Data};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("message watcher failed: {0}")]
    Watcher(#[from] serenity::Error),
}

async fn event_handler(
    serenity_ctx: &serenity::Context,
    event: &FullEvent,
    _framework_ctx: FrameworkContext<'_, Data, CommandError>,
    _data: &Data,
) -> Result<(), HandlerError> {
    let filter_watcher_msg = |msg: &Message| !msg.is_own(&serenity_ctx.cache) && !msg.is_private();

    match event {
        FullEvent::Message { new_message: msg } if filter_watcher_msg(msg) => {
            fight(serenity_ctx.http(), msg).await?;
        }
        _ => (),
    }

    Ok(())
}

fn mentions_fight(content: &str) -> bool {
    Regex::new(r"(?i)this is my fight")
        .expect("hard-coded regex should be valid")
        .is_match(content)
}

async fn fight(http: &serenity::Http, msg: &Message) -> Result<(), serenity::Error> {
    if mentions_fight(&msg.content) {
        trace!(%msg.author.id, "fight watcher triggered");

        msg.channel_id
            .say(http, "No, Senpai. This is our fight!")
            .await?;
    }

    Ok(())
}

pub fn poise<'a>(
    serenity_ctx: &'a serenity::Context,
    event: &'a FullEvent,
    framework_ctx: FrameworkContext<'a, Data, CommandError>,
    data: &'a Data,
) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'a>> {
    Box::pin(async move {
        event_handler(serenity_ctx, event, framework_ctx, data)
            .await
            .map_err(CommandError::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fight_watcher_matches_anywhere_in_a_message() {
        assert!(mentions_fight("this is my fight"));
        assert!(mentions_fight("stand back, This Is My Fight!"));
        assert!(!mentions_fight("this is my flight"));
    }
}
