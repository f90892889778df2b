//! Pixiv image posting, on demand and on a timer.

use std::time::Duration;

use poise::{
    serenity_prelude::{ChannelId, CreateAttachment, CreateMessage, Http},
    CreateReply,
};
use tracing::{instrument, warn};

use crate::{
    api::pixiv::Pixiv,
    commands::LogCommands,
    utils::{
        poise::{CommandResult, ContextExt},
        Context,
    },
};

pub fn commands() -> Vec<crate::utils::poise::Command> {
    vec![image(), nsfw(), autoimage()]
}

const UNCONFIGURED: &str = "Senpai has not configured pixiv yet!";

async fn post_random(ctx: Context<'_>, nsfw: bool) -> CommandResult {
    let pixiv = ctx.data().pixiv();

    if !pixiv.configured() {
        ctx.reply_ext(UNCONFIGURED).await?;
        return Ok(());
    }

    // fetching and downloading takes a moment
    ctx.defer().await?;

    let post = pixiv.random_post(nsfw).await?;
    let bytes = pixiv.download(&post.image_url).await?;

    let attachment = CreateAttachment::bytes(bytes, post.filename().to_owned());

    ctx.send(
        CreateReply::default()
            .content(format!("<{}>", post.page_url()))
            .attachment(attachment),
    )
    .await?;

    Ok(())
}

async fn auto_post(pixiv: &Pixiv, http: &Http, channel: ChannelId) -> CommandResult {
    let post = pixiv.random_post(false).await?;
    let bytes = pixiv.download(&post.image_url).await?;

    let attachment = CreateAttachment::bytes(bytes, post.filename().to_owned());

    channel
        .send_message(
            http,
            CreateMessage::new()
                .content(format!("<{}>", post.page_url()))
                .add_file(attachment),
        )
        .await?;

    Ok(())
}

/// Posts a random illustration from pixiv
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command)]
pub async fn image(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;
    post_random(ctx, false).await
}

/// Posts a random NSFW illustration from pixiv
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, nsfw_only)]
pub async fn nsfw(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;
    post_random(ctx, true).await
}

/// Posts a random illustration from pixiv every X minutes (min. 1, 0 to cancel)
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command)]
pub async fn autoimage(
    ctx: Context<'_>,
    #[description = "Minutes between posts, 0 to cancel"] delay: u64,
) -> CommandResult {
    ctx.log_command().await;

    let data = ctx.data();
    let channel = ctx.channel_id();

    if delay == 0 {
        if data.tasks().cancel(channel).await {
            ctx.reply_ext("No longer posting images in this channel!")
                .await?;
        } else {
            ctx.reply_ext("This channel is not setup to post images!")
                .await?;
        }

        return Ok(());
    }

    if !data.pixiv().configured() {
        ctx.reply_ext(UNCONFIGURED).await?;
        return Ok(());
    }

    let pixiv = data.pixiv().clone();
    let http = ctx.serenity_context().http.clone();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(delay * 60));

        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            if let Err(err) = auto_post(&pixiv, &http, channel).await {
                warn!(%channel, "scheduled pixiv post failed: {err}");
            }
        }
    });

    data.tasks().register(channel, handle).await;

    ctx.reply_ext(format!(
        "I will post images in this channel every {delay} minute(s)!"
    ))
    .await?;

    Ok(())
}
