//! Locale-aware template rendering for every user-visible message.
//!
//! Templates live under `<templates_dir>/<locale>/…`; a locale is just a
//! sub-directory. Rendered output is clipped to the Telegram message length
//! with an HTML-aware truncation so clipped messages never ship an unclosed
//! tag to the Bot API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use minijinja::{path_loader, Environment};
use serde::Serialize;

/// Telegram caps message text at 4096 characters
pub const MAX_TEXT_LEN: usize = 4096;

#[derive(Clone)]
pub struct Renderer(Arc<RendererInner>);

struct RendererInner {
    env: Environment<'static>,
    root: PathBuf,
    default_locale: String,
}

impl Renderer {
    pub fn new(root: impl Into<PathBuf>, default_locale: &str) -> Self {
        let root = root.into();
        let mut env = Environment::new();
        env.set_loader(path_loader(&root));
        Self(Arc::new(RendererInner { env, root, default_locale: default_locale.to_string() }))
    }

    /// Locales available on disk, one per sub-directory of the template root
    pub fn locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = std::fs::read_dir(&self.0.root)
            .into_iter()
            .flatten()
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        locales.sort();
        locales
    }

    /// Render `<locale>/<tmpl>`, falling back to the default locale when the
    /// requested one has no such template. Output longer than `MAX_TEXT_LEN`
    /// characters is truncated without leaving tags open.
    pub fn render(&self, tmpl: &str, locale: &str, ctx: impl Serialize) -> Result<String> {
        let template = self
            .0
            .env
            .get_template(&format!("{locale}/{tmpl}"))
            .or_else(|_| self.0.env.get_template(&format!("{}/{tmpl}", self.0.default_locale)))
            .with_context(|| format!("template not found: {tmpl}"))?;
        let rendered = template.render(ctx)?;
        Ok(smart_trunc(&rendered, MAX_TEXT_LEN))
    }
}

/// Truncate to `max_len` characters, cutting back to the first unclosed HTML
/// tag so the result stays well-formed, and append an ellipsis.
fn smart_trunc(html: &str, max_len: usize) -> String {
    const SUFFIX: &str = "...";
    let chars: Vec<char> = html.chars().collect();
    if chars.len() <= max_len {
        return html.to_string();
    }
    let budget = max_len.saturating_sub(SUFFIX.len());
    if !html.contains('<') {
        return with_suffix(&chars[..budget], SUFFIX);
    }
    let chars = &chars[..budget];
    // Stack of (tag name, position of its '<')
    let mut stack: Vec<(String, usize)> = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        if chars[pos] != '<' {
            pos += 1;
            continue;
        }
        let closing = chars.get(pos + 1) == Some(&'/');
        let name_start = pos + if closing { 2 } else { 1 };
        let mut end = name_start;
        while end < chars.len() && chars[end] != '>' {
            end += 1;
        }
        if end == chars.len() {
            // The budget cut through this tag
            let cut = stack.first().map(|&(_, p)| p).unwrap_or(pos);
            return with_suffix(&chars[..cut], SUFFIX);
        }
        let name: String =
            chars[name_start..end].iter().take_while(|c| !c.is_whitespace()).collect();
        let self_closing = chars[end - 1] == '/';
        if closing {
            if stack.last().map(|(n, _)| n == &name).unwrap_or(false) {
                stack.pop();
            }
        } else if !self_closing {
            stack.push((name, pos));
        }
        pos = end + 1;
    }
    let cut = stack.first().map(|&(_, p)| p).unwrap_or(chars.len());
    with_suffix(&chars[..cut], SUFFIX)
}

fn with_suffix(chars: &[char], suffix: &str) -> String {
    let mut s: String = chars.iter().collect();
    s.push_str(suffix);
    s
}

#[cfg(test)]
mod test {
    use minijinja::context;

    use super::*;

    fn renderer() -> Renderer {
        Renderer::new("./templates", "en")
    }

    #[test]
    fn renders_with_context() {
        let text = renderer().render("common/start.j2", "en", context! { name => "Alice" }).unwrap();
        assert!(text.contains("Alice"));
    }

    #[test]
    fn unknown_locale_falls_back_to_default() {
        let text = renderer().render("common/help.j2", "de", context! {}).unwrap();
        assert!(!text.is_empty());
    }

    #[test]
    fn lists_shipped_locales() {
        let locales = renderer().locales();
        assert!(locales.contains(&"en".to_string()));
        assert!(locales.contains(&"ru".to_string()));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(smart_trunc("<b>hi</b>", 100), "<b>hi</b>");
    }

    #[test]
    fn plain_text_is_clipped_with_ellipsis() {
        assert_eq!(smart_trunc("aaaaaaaaaa", 8), "aaaaa...");
    }

    #[test]
    fn unclosed_tag_is_cut_back() {
        // budget lands inside <b>'s body, so the cut backs up to the '<'
        assert_eq!(smart_trunc("aa<b>bbbbbbbb</b>", 10), "aa...");
    }

    #[test]
    fn closed_tags_survive_truncation() {
        assert_eq!(smart_trunc("<b>aa</b>cccccccccc", 12), "<b>aa</b>...");
    }

    #[test]
    fn tag_split_by_budget_is_dropped() {
        // budget ends at "aaaaa<b", mid-tag
        assert_eq!(smart_trunc("aaaaa<b>bbbbbbbb", 10), "aaaaa...");
    }
}
