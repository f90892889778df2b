//! MyAnimeList lookups. The typeahead endpoint returns everything at once,
//! so the selector pages through a local slice of the one response instead
//! of refetching.

use std::num::NonZeroUsize;

use poise::serenity_prelude::CreateEmbed;
use tracing::instrument;

use crate::{
    api::mal::{Details, Medium, SearchEntry},
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
    vec![malanime(), malmanga()]
}

struct CachedSearch<'a> {
    results: &'a [SearchEntry],
}

impl PageSource for CachedSearch<'_> {
    type Item = SearchEntry;
    type Error = CommandError;

    async fn fetch(&self, page: NonZeroUsize) -> Result<Page<SearchEntry>, CommandError> {
        Ok(Page::slice(self.results, page))
    }
}

async fn lookup(ctx: Context<'_>, medium: Medium, title: &str) -> CommandResult {
    let mal = ctx.data().mal();
    let results = mal.search(medium, title).await?;

    let source = CachedSearch { results: &results };
    let mut dialog = ChannelDialog::from_ctx(&ctx);

    let entry = match select::select(&source, &mut dialog).await? {
        Outcome::Selected(entry) => entry,
        Outcome::NotFound => {
            ctx.reply_ext("I couldn't find anything with that name!")
                .await?;
            return Ok(());
        }
        Outcome::TimedOut => return Ok(()),
    };

    let details = mal.details(&entry).await?;
    ctx.send_embed(entry_embed(medium, &entry, &details)).await?;

    Ok(())
}

fn entry_embed(medium: Medium, entry: &SearchEntry, details: &Details) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(entry.name.clone())
        .url(entry.url.clone());

    if let Some(media_type) = &entry.payload.media_type {
        embed = embed.field("Type", media_type, true);
    }

    match medium {
        Medium::Anime => {
            if let Some(episodes) = details.field("Episodes") {
                embed = embed.field("Episodes", episodes, true);
            }
        }
        Medium::Manga => {
            if let Some(chapters) = details.field("Chapters") {
                embed = embed.field("Chapters", chapters, true);
            }

            if let Some(volumes) = details.field("Volumes") {
                embed = embed.field("Volumes", volumes, true);
            }
        }
    }

    if let Some(score) = &entry.payload.score {
        embed = embed.field("MAL Score", format!(":star: {score}"), true);
    }

    if let Some(status) = &entry.payload.status {
        embed = embed.field("Status", status, true);
    }

    if let Some(dates) = entry.payload.dates() {
        let name = match medium {
            Medium::Anime => "Aired",
            Medium::Manga => "Published",
        };

        embed = embed.field(name, dates, true);
    }

    if let Some(synopsis) = &details.synopsis {
        embed = embed.field("Synopsis", html::truncate(synopsis, 1024), false);
    }

    if let Some(image) = &details.image {
        embed = embed.image(image);
    }

    embed
}

/// Searches for an anime on MyAnimeList
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, aliases("mala"))]
pub async fn malanime(
    ctx: Context<'_>,
    #[description = "Title to search for"]
    #[rest]
    title: String,
) -> CommandResult {
    ctx.log_command().await;
    lookup(ctx, Medium::Anime, &title).await
}

/// Searches for a manga on MyAnimeList
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, aliases("malm"))]
pub async fn malmanga(
    ctx: Context<'_>,
    #[description = "Title to search for"]
    #[rest]
    title: String,
) -> CommandResult {
    ctx.log_command().await;
    lookup(ctx, Medium::Manga, &title).await
}
