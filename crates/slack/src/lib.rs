//! Slack surface of weeklybot.
//!
//! - `blocks`: Block Kit types, the weekly update modal, options responses and
//!   the channel summary text
//! - `commands`: slash command form payload
//! - `interactions`: interaction and options payload parsing
//! - `client`: `SlackApi` seam and its Web API implementation

pub mod blocks;
pub mod client;
pub mod commands;
pub mod interactions;

pub use blocks::{project_options, weekly_update_message, weekly_update_modal, ModalView};
pub use client::{SlackApi, WebApiClient};
pub use commands::{OpenModalRequest, SlashCommandPayload};
pub use interactions::{parse_interaction, parse_options_query, Interaction, InteractionKind};
