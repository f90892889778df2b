pub mod html;

pub mod poise;
pub use poise::Context;
