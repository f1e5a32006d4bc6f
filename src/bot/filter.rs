use teloxide::dispatching::DpHandlerDescription;
use teloxide::prelude::*;
use teloxide::types::ChatKind;

use super::utils::CallbackData;
use crate::config::Config;

pub fn filter_admin_msg<Output>() -> Handler<'static, DependencyMap, Output, DpHandlerDescription>
where
    Output: Send + Sync + 'static,
{
    dptree::filter(|message: Message, cfg: Config| {
        message
            .from()
            .map(|user| cfg.telegram.admin_ids.contains(&ChatId(user.id.0 as i64)))
            .unwrap_or_default()
    })
}

pub fn filter_private_chat<Output>() -> Handler<'static, DependencyMap, Output, DpHandlerDescription>
where
    Output: Send + Sync + 'static,
{
    dptree::filter(|message: Message| matches!(message.chat.kind, ChatKind::Private(_)))
}

pub fn filter_callbackdata<Output>() -> Handler<'static, DependencyMap, Output, DpHandlerDescription>
where
    Output: Send + Sync + 'static,
{
    dptree::filter_map(|callback: CallbackQuery| {
        callback.data.and_then(|s| CallbackData::unpack(&s))
    })
}
