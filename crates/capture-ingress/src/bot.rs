//! Teloxide wiring: the concrete transport implied by the original source's
//! project name (`PantaKoda/TelegramBots`). Everything here is thin glue —
//! parse the update, call `adapter`, reply. All grouping truth lives in the
//! store; this module holds no session state of its own.

use std::future::Future;
use std::sync::Arc;

use capture_schemas::CaptureError;
use sqlx::PgPool;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::adapter;
use crate::command::{parse_command, Command};
use crate::config::IngressConfig;

pub const INGRESS_SOURCE: &str = "telegram";

/// Uploads a Telegram file to the blob store (out of scope for this core —
/// see `spec.md` §1) and returns the resulting object key. The core never
/// sees file bytes, only this string.
pub trait ObjectUploader: Send + Sync + 'static {
    fn upload(
        &self,
        bot: &Bot,
        file_id: &str,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

#[derive(Clone)]
pub struct BotState<U> {
    pub pool: PgPool,
    pub config: Arc<IngressConfig>,
    pub uploader: Arc<U>,
}

/// Build the teloxide dispatcher and run it until shutdown or Ctrl-C.
pub async fn run<U: ObjectUploader>(
    pool: PgPool,
    config: IngressConfig,
    uploader: U,
) -> anyhow::Result<()> {
    if config.allowed_user_ids.is_empty() {
        warn!(
            "capture-ingress starting with NO user restrictions — \
             set TELEGRAM_ALLOWED_USER_IDS to restrict access"
        );
    }

    let bot = Bot::new(&config.bot_token);
    let state = BotState {
        pool,
        config: Arc::new(config),
        uploader: Arc::new(uploader),
    };

    let handler = Update::filter_message().endpoint({
        let state = state.clone();
        move |bot: Bot, msg: Message| {
            let state = state.clone();
            async move { handle_message(bot, msg, state).await }
        }
    });

    info!("capture-ingress starting");
    Box::pin(
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch(),
    )
    .await;
    info!("capture-ingress stopped");

    Ok(())
}

async fn handle_message<U: ObjectUploader>(
    bot: Bot,
    msg: Message,
    state: BotState<U>,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    let user_allowed = match &msg.from {
        Some(user) => state.config.is_user_allowed(user.id.0 as i64),
        None => state.config.allowed_user_ids.is_empty(),
    };
    if !user_allowed {
        let _ = bot
            .send_message(chat_id, "You are not authorized to use this bot.")
            .await;
        return Ok(());
    }

    let user_id = match &msg.from {
        Some(user) => user.id.0 as i64,
        None => {
            let _ = bot
                .send_message(chat_id, "Could not identify sender.")
                .await;
            return Ok(());
        }
    };

    if let Some(text) = msg.text() {
        if let Some(command) = parse_command(text) {
            return handle_command(&bot, chat_id, user_id, command, &state).await;
        }
        // Non-command text: neither an upload nor a recognized command.
        // The adapter is stateless with respect to free text, so there is
        // nothing to do beyond silence (mirrors "rejections: reply only").
        return Ok(());
    }

    let file_id = match extract_image_file_id(&msg) {
        Some(id) => id,
        None => {
            let _ = bot
                .send_message(chat_id, adapter::rejected_media_reply())
                .await;
            return Ok(());
        }
    };

    let object_key = match state.uploader.upload(&bot, &file_id).await {
        Ok(key) => key,
        Err(err) => {
            warn!(error = %err, "object upload failed");
            let _ = bot
                .send_message(chat_id, "Failed to store the image, please try again.")
                .await;
            return Ok(());
        }
    };

    let external_message_id = Some(msg.id.0 as i64);
    match adapter::handle_upload(
        &state.pool,
        user_id,
        &object_key,
        external_message_id,
        Some(INGRESS_SOURCE),
    )
    .await
    {
        Ok(outcome) => {
            let _ = bot.send_message(chat_id, adapter::upload_reply(&outcome)).await;
        }
        Err(CaptureError::IllegalState(_)) => {
            let _ = bot
                .send_message(chat_id, adapter::rejected_media_reply())
                .await;
        }
        Err(err) => {
            warn!(error = %err, user_id, "upload handling failed");
            let _ = bot
                .send_message(chat_id, "Something went wrong, please try again.")
                .await;
        }
    }

    Ok(())
}

async fn handle_command<U: ObjectUploader>(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    command: Command,
    state: &BotState<U>,
) -> anyhow::Result<()> {
    match command {
        Command::StartSession => {
            match adapter::start_session(&state.pool, user_id, Some(INGRESS_SOURCE)).await {
                Ok(session) => {
                    let _ = bot
                        .send_message(chat_id, format!("Session {} is open. Send your screenshots.", session.id))
                        .await;
                }
                Err(err) => {
                    warn!(error = %err, user_id, "start_session failed");
                    let _ = bot
                        .send_message(chat_id, "Could not start a session, please try again.")
                        .await;
                }
            }
        }
        Command::Close | Command::Done => match adapter::close_session(&state.pool, user_id).await {
            Ok(Some(session)) => {
                let count = capture_db::image::count_by_session(&state.pool, session.id)
                    .await
                    .unwrap_or_default();
                let _ = bot.send_message(chat_id, adapter::close_reply(count)).await;
            }
            Ok(None) => {
                let _ = bot
                    .send_message(chat_id, adapter::close_reply_no_open_session())
                    .await;
            }
            Err(err) => {
                warn!(error = %err, user_id, "close_session failed");
                let _ = bot
                    .send_message(chat_id, "Could not close the session, please try again.")
                    .await;
            }
        },
    }

    Ok(())
}

/// A valid upload is a photo, or a document whose declared MIME type is an
/// image. Returns the largest photo size's file id, or the document's.
fn extract_image_file_id(msg: &Message) -> Option<String> {
    if let Some(sizes) = msg.photo() {
        return sizes.last().map(|s| s.file.id.clone());
    }

    if let Some(doc) = msg.document() {
        let is_image = doc
            .mime_type
            .as_ref()
            .map(|m| m.type_() == mime::IMAGE)
            .unwrap_or(false);
        if is_image {
            return Some(doc.file.id.clone());
        }
    }

    None
}
