#![warn(clippy::perf)]
#![warn(clippy::unwrap_used)]

mod api;
mod commands;
mod errors;
mod select;
mod store;
mod tasks;
mod utils;

mod framework;
pub use framework::data::Data;

use poise::serenity_prelude::{self as serenity, GatewayIntents};

#[allow(unused_imports)]
use tracing::{debug, info, trace};

#[tokio::main]
async fn main() {
    framework::logging::init_tracing();

    let data = Data::new().await.expect("startup data should load");
    let token = data.config().bot.token().to_owned();

    let framework = framework::poise::build(data);

    let mut client = serenity::Client::builder(token, GatewayIntents::all())
        .framework(framework)
        .await
        .expect("client should be valid");

    client
        .start()
        .await
        .expect("client should not return error");
}
