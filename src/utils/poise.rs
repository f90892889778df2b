use poise::{serenity_prelude as serenity, CreateReply};

use crate::Data;

pub type Context<'a> = poise::Context<'a, Data, crate::errors::CommandError>;

pub type Error = crate::errors::CommandError;
pub type Command = poise::Command<Data, Error>;
pub type CommandResult = Result<(), Error>;

pub trait ContextExt {
    async fn reply_ext(
        &self,
        text: impl Into<String> + Send,
    ) -> Result<poise::ReplyHandle<'_>, serenity::Error>;

    async fn send_embed(
        &self,
        embed: serenity::CreateEmbed,
    ) -> Result<poise::ReplyHandle<'_>, serenity::Error>;

    fn in_guild(&self) -> bool;

    fn in_dm(&self) -> bool {
        !self.in_guild()
    }
}

impl ContextExt for Context<'_> {
    async fn reply_ext(
        &self,
        text: impl Into<String> + Send,
    ) -> Result<poise::ReplyHandle<'_>, serenity::Error> {
        let builder = CreateReply::default().reply(true).content(text);
        self.send(builder).await
    }

    async fn send_embed(
        &self,
        embed: serenity::CreateEmbed,
    ) -> Result<poise::ReplyHandle<'_>, serenity::Error> {
        self.send(CreateReply::default().embed(embed)).await
    }

    fn in_guild(&self) -> bool {
        self.guild_id().is_some()
    }
}
