use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::bot::utils::CallbackData;
use crate::config::Config;

/// Locale the user's Telegram client reports, or the configured default
pub fn user_locale(message: &Message, cfg: &Config) -> String {
    message
        .from()
        .and_then(|user| user.language_code.clone())
        .unwrap_or_else(|| cfg.default_locale.clone())
}

/// One row per available locale, plus a close button
pub fn settings_keyboard(locales: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = locales
        .iter()
        .map(|locale| {
            vec![InlineKeyboardButton::callback(
                locale.to_uppercase(),
                CallbackData::SetLocale(locale.clone()).pack(),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("✖", CallbackData::CloseMenu.pack())]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keyboard_has_a_row_per_locale_plus_close() {
        let kb = settings_keyboard(&["en".to_string(), "ru".to_string()]);
        assert_eq!(kb.inline_keyboard.len(), 3);
        assert_eq!(kb.inline_keyboard[0][0].text, "EN");
        assert_eq!(kb.inline_keyboard[2][0].text, "✖");
    }
}
