//! The serenity side of a selection dialog: one embed prompt per dialog,
//! edited in place on navigation, plus a reply collector scoped to the
//! requester and channel.

use std::{sync::Arc, time::Duration};

use poise::serenity_prelude::{
    ChannelId, CreateEmbed, CreateMessage, EditMessage, Http, Message, ShardMessenger, UserId,
};
use tracing::{debug, trace};

use super::{Dialog, Input};

const PROMPT_TITLE: &str = "Which one are you talking about?";

pub struct ChannelDialog {
    http: Arc<Http>,
    shard: ShardMessenger,
    channel: ChannelId,
    author: UserId,
    prompt: Option<Message>,
}

impl ChannelDialog {
    pub fn new(http: Arc<Http>, shard: ShardMessenger, channel: ChannelId, author: UserId) -> Self {
        Self {
            http,
            shard,
            channel,
            author,
            prompt: None,
        }
    }

    pub fn from_ctx(ctx: &crate::utils::Context<'_>) -> Self {
        let serenity_ctx = ctx.serenity_context();

        Self::new(
            serenity_ctx.http.clone(),
            serenity_ctx.shard.clone(),
            ctx.channel_id(),
            ctx.author().id,
        )
    }

    fn embed(body: &str) -> CreateEmbed {
        CreateEmbed::new().title(PROMPT_TITLE).description(body)
    }
}

impl Dialog for ChannelDialog {
    type Error = poise::serenity_prelude::Error;
    type Reply = Message;

    async fn render(&mut self, body: &str) -> Result<(), Self::Error> {
        match self.prompt.as_mut() {
            Some(prompt) => {
                prompt
                    .edit(&self.http, EditMessage::new().embed(Self::embed(body)))
                    .await?;
            }
            None => {
                let prompt = self
                    .channel
                    .send_message(&self.http, CreateMessage::new().embed(Self::embed(body)))
                    .await?;

                trace!(%prompt.id, "prompt sent");
                self.prompt = Some(prompt);
            }
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        if let Some(prompt) = self.prompt.take() {
            prompt.delete(&self.http).await?;
        }

        Ok(())
    }

    async fn next_reply(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Input, Message)>, Self::Error> {
        let reply = self
            .channel
            .await_reply(&self.shard)
            .author_id(self.author)
            .filter(|msg| Input::matches(&msg.content))
            .timeout(timeout)
            .await;

        Ok(reply.and_then(|msg| Input::parse(&msg.content).map(|input| (input, msg))))
    }

    async fn consume(&mut self, reply: Message) -> Result<(), Self::Error> {
        reply.delete(&self.http).await
    }
}

/// Last-resort cleanup: if the owning command is cancelled mid-dialog, the
/// prompt still comes down.
impl Drop for ChannelDialog {
    fn drop(&mut self) {
        if let Some(prompt) = self.prompt.take() {
            let http = self.http.clone();

            tokio::spawn(async move {
                if let Err(err) = prompt.delete(&http).await {
                    debug!("could not delete orphaned prompt: {err}");
                }
            });
        }
    }
}
