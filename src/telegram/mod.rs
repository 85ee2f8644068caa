pub mod client;
pub mod commands;
pub mod listener;
pub mod types;

pub use client::TelegramClient;
pub use commands::{Command, CommandHandler, IncomingMessage};
pub use listener::CommandListener;
