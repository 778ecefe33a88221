pub mod commands;
pub mod format;
pub mod sink;

pub use commands::{respond, send_alert, start_bot, BotDeps, Command};
pub use sink::TelegramSink;
