//! Guild role helper: moderators curate a set of callable roles, members
//! join and leave them, and anyone in a role can ping it. The callable set
//! and per-role call messages persist in the config store, scoped by guild.

use std::collections::HashMap;

use poise::serenity_prelude::{self as serenity, EditRole, GuildId, Mentionable, RoleId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    commands::LogCommands,
    store::{self, ConfigStore, Scope},
    utils::{
        poise::{CommandResult, ContextExt},
        Context,
    },
};

pub fn commands() -> Vec<crate::utils::poise::Command> {
    vec![
        acr(),
        rcr(),
        lcr(),
        iam(),
        iamnot(),
        call(),
        setcallmsg(),
        removecallmsg(),
    ]
}

const KEY: &str = "rolecall";

/// A guild's rolecall state. Message keys are stringified role ids because
/// the store's tables only take string keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Rolecall {
    #[serde(default)]
    roles: Vec<u64>,

    #[serde(default)]
    messages: HashMap<String, String>,
}

impl Rolecall {
    fn contains(&self, role: RoleId) -> bool {
        self.roles.contains(&role.get())
    }

    /// Returns false if the role was already callable.
    fn add(&mut self, role: RoleId) -> bool {
        if self.contains(role) {
            return false;
        }

        self.roles.push(role.get());
        true
    }

    /// Removes the role and its call message. Returns false if it wasn't
    /// callable.
    fn remove(&mut self, role: RoleId) -> bool {
        let Some(index) = self.roles.iter().position(|id| *id == role.get()) else {
            return false;
        };

        self.roles.remove(index);
        self.messages.remove(&role.get().to_string());
        true
    }

    fn message(&self, role: RoleId) -> Option<&str> {
        self.messages.get(&role.get().to_string()).map(String::as_str)
    }

    fn set_message(&mut self, role: RoleId, message: String) {
        self.messages.insert(role.get().to_string(), message);
    }

    fn remove_message(&mut self, role: RoleId) -> bool {
        self.messages.remove(&role.get().to_string()).is_some()
    }
}

async fn load(store: &impl ConfigStore, guild: GuildId) -> Result<Rolecall, store::Error> {
    Ok(store
        .get(Scope::Guild(guild), KEY)
        .await?
        .unwrap_or_default())
}

async fn save(
    store: &impl ConfigStore,
    guild: GuildId,
    rolecall: &Rolecall,
) -> Result<(), store::Error> {
    store.set(Scope::Guild(guild), KEY, rolecall).await
}

fn guild_id(ctx: &Context<'_>) -> GuildId {
    ctx.guild_id().expect("command is guild_only")
}

/// Adds a role to the list of callable roles
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn acr(
    ctx: Context<'_>,
    #[description = "Role to make callable"] role: serenity::Role,
) -> CommandResult {
    ctx.log_command().await;

    let store = ctx.data().store();
    let guild = guild_id(&ctx);

    let mut rolecall = load(store, guild).await?;

    if !rolecall.add(role.id) {
        ctx.reply_ext(format!("The role '{}' is already callable.", role.name))
            .await?;
        return Ok(());
    }

    save(store, guild, &rolecall).await?;

    ctx.reply_ext(format!("The role '{}' is now callable.", role.name))
        .await?;

    Ok(())
}

/// Removes a role from the list of callable roles
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn rcr(
    ctx: Context<'_>,
    #[description = "Role to remove"] role: serenity::Role,
) -> CommandResult {
    ctx.log_command().await;

    let store = ctx.data().store();
    let guild = guild_id(&ctx);

    let mut rolecall = load(store, guild).await?;

    if !rolecall.remove(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' is not in the list of callable roles.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    save(store, guild, &rolecall).await?;

    ctx.reply_ext(format!(
        "The role '{}' has been removed from callable roles.",
        role.name
    ))
    .await?;

    Ok(())
}

/// List all callable roles on this server
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn lcr(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;

    let rolecall = load(ctx.data().store(), guild_id(&ctx)).await?;

    if rolecall.roles.is_empty() {
        ctx.reply_ext("There are no callable roles on this server.")
            .await?;
        return Ok(());
    }

    // resolve ids to names while the cache ref is in scope
    let names: Vec<String> = {
        match ctx.guild() {
            Some(guild) => rolecall
                .roles
                .iter()
                .filter(|id| **id != 0)
                .filter_map(|id| guild.roles.get(&RoleId::new(*id)))
                .map(|role| role.name.clone())
                .collect(),
            None => Vec::new(),
        }
    };

    ctx.reply_ext(format!("List of callable roles:\n`{}`", names.join("\n")))
        .await?;

    Ok(())
}

/// Add yourself to a callable role
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn iam(
    ctx: Context<'_>,
    #[description = "Role to join"] role: serenity::Role,
) -> CommandResult {
    ctx.log_command().await;

    let rolecall = load(ctx.data().store(), guild_id(&ctx)).await?;

    if !rolecall.contains(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' is not in the list of callable roles.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    let Some(member) = ctx.author_member().await else {
        return Ok(());
    };

    if member.roles.contains(&role.id) {
        ctx.reply_ext(format!("You already have the role '{}'.", role.name))
            .await?;
        return Ok(());
    }

    member.add_role(ctx.http(), role.id).await?;

    ctx.reply_ext(format!("You've been added to '{}'.", role.name))
        .await?;

    Ok(())
}

/// Remove yourself from a callable role
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn iamnot(
    ctx: Context<'_>,
    #[description = "Role to leave"] role: serenity::Role,
) -> CommandResult {
    ctx.log_command().await;

    let rolecall = load(ctx.data().store(), guild_id(&ctx)).await?;

    if !rolecall.contains(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' is not in the list of callable roles.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    let Some(member) = ctx.author_member().await else {
        return Ok(());
    };

    if !member.roles.contains(&role.id) {
        ctx.reply_ext(format!("You are not part of the role '{}'.", role.name))
            .await?;
        return Ok(());
    }

    member.remove_role(ctx.http(), role.id).await?;

    ctx.reply_ext(format!("You've been removed from '{}'.", role.name))
        .await?;

    Ok(())
}

/// Calls a callable role (you must be a member)
#[instrument(skip_all)]
#[poise::command(slash_command, prefix_command, guild_only, guild_cooldown = 10)]
pub async fn call(
    ctx: Context<'_>,
    #[description = "Role to ping"] mut role: serenity::Role,
) -> CommandResult {
    ctx.log_command().await;

    let Some(member) = ctx.author_member().await else {
        return Ok(());
    };

    if !member.roles.contains(&role.id) {
        ctx.reply_ext(format!(
            "You are not part of the role '{}'. You can only use this command if you are part of the role.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    let rolecall = load(ctx.data().store(), guild_id(&ctx)).await?;

    if !rolecall.contains(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' is not in the list of callable roles.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    // roles are usually kept unmentionable, so flip it just for the ping
    let temp_mention = !role.mentionable;

    if temp_mention {
        role.edit(ctx.http(), EditRole::new().mentionable(true))
            .await?;
    }

    match rolecall.message(role.id) {
        Some(message) => ctx.say(message.to_owned()).await?,
        None => {
            ctx.say(format!("Pinging all members of {}!", role.mention()))
                .await?
        }
    };

    if temp_mention {
        role.edit(ctx.http(), EditRole::new().mentionable(false))
            .await?;
    }

    Ok(())
}

/// Sets the call message for a callable role
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    aliases("scm"),
    required_permissions = "MANAGE_ROLES"
)]
pub async fn setcallmsg(
    ctx: Context<'_>,
    #[description = "Callable role"] role: serenity::Role,
    #[description = "Message to send on call"]
    #[rest]
    message: String,
) -> CommandResult {
    ctx.log_command().await;

    let store = ctx.data().store();
    let guild = guild_id(&ctx);

    let mut rolecall = load(store, guild).await?;

    if !rolecall.contains(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' is not in the list of callable roles.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    rolecall.set_message(role.id, message);
    save(store, guild, &rolecall).await?;

    ctx.reply_ext(format!("Call message for '{}' has been set.", role.name))
        .await?;

    Ok(())
}

/// Removes the call message for a callable role
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    aliases("rcm"),
    required_permissions = "MANAGE_ROLES"
)]
pub async fn removecallmsg(
    ctx: Context<'_>,
    #[description = "Callable role"] role: serenity::Role,
) -> CommandResult {
    ctx.log_command().await;

    let store = ctx.data().store();
    let guild = guild_id(&ctx);

    let mut rolecall = load(store, guild).await?;

    if !rolecall.contains(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' is not in the list of callable roles.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    if !rolecall.remove_message(role.id) {
        ctx.reply_ext(format!(
            "The role '{}' has no custom call message.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    save(store, guild, &rolecall).await?;

    ctx.reply_ext(format!("Call message for '{}' has been removed.", role.name))
        .await?;

    Ok(())
}
