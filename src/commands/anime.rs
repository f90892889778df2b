//! AniList lookups: `anime`, `manga` and the list owner's `review`s.

use std::num::NonZeroUsize;

use poise::serenity_prelude::CreateEmbed;
use tracing::instrument;

use crate::{
    api::anilist::{self, AniList, Media, MediaType},
    commands::LogCommands,
    errors::CommandError,
    select::{self, ChannelDialog, Outcome, Page, PageSource},
    utils::{
        html,
        poise::{CommandResult, ContextExt},
        Context,
    },
};

pub fn commands() -> Vec<crate::utils::poise::Command> {
    vec![anime(), manga(), review()]
}

struct MediaSearch<'a> {
    anilist: &'a AniList,
    kind: MediaType,
    title: &'a str,
}

impl PageSource for MediaSearch<'_> {
    type Item = Media;
    type Error = CommandError;

    async fn fetch(&self, page: NonZeroUsize) -> Result<Page<Media>, CommandError> {
        Ok(self.anilist.search(self.kind, self.title, page).await?)
    }
}

/// Resolves a title query to one media entry, asking the requester to
/// disambiguate when needed. `None` means the interaction already ended
/// (nothing found, or nobody answered).
async fn pick_media(
    ctx: Context<'_>,
    kind: MediaType,
    title: &str,
) -> Result<Option<Media>, CommandError> {
    let source = MediaSearch {
        anilist: ctx.data().anilist(),
        kind,
        title,
    };

    let mut dialog = ChannelDialog::from_ctx(&ctx);

    match select::select(&source, &mut dialog).await? {
        Outcome::Selected(media) => Ok(Some(media)),
        Outcome::NotFound => {
            ctx.reply_ext("I couldn't find anything with that name!")
                .await?;
            Ok(None)
        }
        Outcome::TimedOut => Ok(None),
    }
}

fn media_embed(kind: MediaType, media: &Media) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(media.title.display().to_owned());

    if let Some(url) = &media.site_url {
        embed = embed.url(url);
    }

    if let Some(format) = &media.format {
        embed = embed.field("Type", format, true);
    }

    match kind {
        MediaType::Manga => {
            if let Some(chapters) = media.chapters {
                embed = embed.field("Chapters", chapters.to_string(), true);
            }

            if let Some(volumes) = media.volumes {
                embed = embed.field("Volumes", volumes.to_string(), true);
            }
        }
        MediaType::Anime => {
            if let Some(episodes) = media.episodes {
                embed = embed.field("Episodes", episodes.to_string(), true);
            }
        }
    }

    if let Some(score) = media.mean_score {
        embed = embed.field("Mean Score", format!(":star: {score}/100"), true);
    }

    if let Some(status) = &media.status {
        embed = embed.field("Status", status, true);
    }

    if let Some(start) = &media.start_date {
        embed = embed.field("Start Date", start.to_string(), true);
    }

    if let Some(end) = media.end_date.filter(anilist::FuzzyDate::is_known) {
        embed = embed.field("End Date", end.to_string(), true);
    }

    if let Some(description) = &media.description {
        let synopsis = html::strip(description);
        embed = embed.field("Synopsis", html::truncate(&synopsis, 1024), false);
    }

    if let Some(image) = media
        .cover_image
        .as_ref()
        .and_then(|cover| cover.large.as_deref())
    {
        embed = embed.image(image);
    }

    embed
}

/// Searches for an anime on AniList
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, aliases("a"))]
pub async fn anime(
    ctx: Context<'_>,
    #[description = "Title to search for"]
    #[rest]
    title: String,
) -> CommandResult {
    ctx.log_command().await;

    if let Some(media) = pick_media(ctx, MediaType::Anime, &title).await? {
        ctx.send_embed(media_embed(MediaType::Anime, &media)).await?;
    }

    Ok(())
}

/// Searches for a manga on AniList
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, aliases("m"))]
pub async fn manga(
    ctx: Context<'_>,
    #[description = "Title to search for"]
    #[rest]
    title: String,
) -> CommandResult {
    ctx.log_command().await;

    if let Some(media) = pick_media(ctx, MediaType::Manga, &title).await? {
        ctx.send_embed(media_embed(MediaType::Manga, &media)).await?;
    }

    Ok(())
}

/// Senpai's anime reviews
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command)]
pub async fn review(
    ctx: Context<'_>,
    #[description = "Title to look up"]
    #[rest]
    title: String,
) -> CommandResult {
    ctx.log_command().await;

    let anilist = ctx.data().anilist();

    if !anilist.has_token() {
        ctx.reply_ext("Senpai has not configured reviews yet!")
            .await?;
        return Ok(());
    }

    let Some(media) = pick_media(ctx, MediaType::Anime, &title).await? else {
        return Ok(());
    };

    let display = media.title.display().to_owned();

    let Some(entry) = media.media_list_entry.clone() else {
        ctx.reply_ext(format!("Senpai hasn't watched {display} yet!"))
            .await?;
        return Ok(());
    };

    // list notes hold short reviews; long-form ones live as proper reviews
    let review = match entry.notes.clone().filter(|notes| !notes.is_empty()) {
        Some(notes) => notes,
        None => anilist
            .review_body(media.id, entry.user_id)
            .await?
            .unwrap_or_else(|| "Senpai hasn't reviewed this anime!".to_owned()),
    };

    let review = html::strip(&review);

    let mut header = format!("Senpai's Review of {display}");
    let mut parts = html::paginate(&review, 2044);
    let body = parts.pop().unwrap_or_default();

    for part in parts {
        let mut embed = CreateEmbed::new().title(header.clone()).description(part);

        if let Some(url) = &media.site_url {
            embed = embed.url(url);
        }

        ctx.send_embed(embed).await?;

        if !header.ends_with("(cont)") {
            header.push_str(" (cont)");
        }
    }

    let mut embed = CreateEmbed::new().title(header).description(body);

    if let Some(url) = &media.site_url {
        embed = embed.url(url);
    }

    if let Some(format) = &media.format {
        embed = embed.field("Type", format, true);
    }

    if let Some(progress) = entry.progress {
        embed = embed.field("Episodes Watched", progress.to_string(), true);
    }

    if let Some(score) = entry.score {
        embed = embed.field(
            "Final Score",
            format!(":star: {score}/100 {}", anilist::verdict(score)),
            true,
        );
    }

    if let Some(status) = &entry.status {
        embed = embed.field("Status", status, true);
    }

    if let Some(completed) = entry.completed_at.filter(anilist::FuzzyDate::is_known) {
        embed = embed.field("Completed On", completed.to_string(), true);
    }

    if let Some(image) = media
        .cover_image
        .as_ref()
        .and_then(|cover| cover.large.as_deref())
    {
        embed = embed.image(image);
    }

    ctx.send_embed(embed).await?;

    Ok(())
}
