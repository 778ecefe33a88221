use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::debug;

use common::{AlertSink, JobKind, MoverEvent};

use crate::commands::send_alert;
use crate::format::{format_movers, split_message, MAX_MESSAGE_CHARS};

/// Publishes mover alerts to the configured chat.
pub struct TelegramSink {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramSink {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_ids: vec![ChatId(chat_id)],
        }
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn on_mover_events(&self, job: JobKind, events: &[MoverEvent]) {
        let text = format_movers(job, events);
        for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
            send_alert(&self.bot, &self.chat_ids, &chunk).await;
        }
        debug!(job = %job, events = events.len(), "Alert sent to Telegram");
    }
}
