//! Clients for the services the bot fronts.

pub mod anilist;
pub mod mal;
pub mod pixiv;
