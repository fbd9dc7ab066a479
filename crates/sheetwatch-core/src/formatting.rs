//! Row → Telegram message rendering (MarkdownV2 and HTML).

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::HeaderSet;

/// Characters Telegram MarkdownV2 reserves outside of entities.
static MARKDOWN_V2_SPECIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([_\[\]()~`>#+\-=|{}.!?:*\\])").expect("valid regex"));

/// Message rendering. `Rich` is MarkdownV2, `Plain` is the HTML fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStyle {
    Rich,
    Plain,
}

/// First line of a notification, chosen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Banner {
    NewEntry,
    RecentEntry,
}

impl Banner {
    pub fn text(self) -> &'static str {
        match self {
            Banner::NewEntry => "New Entry:",
            Banner::RecentEntry => "Recent Entry:",
        }
    }
}

/// Both renderings of one row, ready for the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedRow {
    pub rich: String,
    pub plain: String,
}

/// Escape MarkdownV2 special characters by prefixing a backslash.
pub fn escape_markdown_v2(text: &str) -> String {
    MARKDOWN_V2_SPECIAL.replace_all(text, r"\$1").into_owned()
}

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render a row as one `label: value` line per cell.
pub fn render(row: &[String], headers: &HeaderSet, style: RenderStyle) -> String {
    row.iter()
        .enumerate()
        .map(|(i, cell)| {
            let label = headers.label(i);
            match style {
                RenderStyle::Rich => format!(
                    "*{}:* {}",
                    escape_markdown_v2(&label),
                    escape_markdown_v2(cell)
                ),
                RenderStyle::Plain => {
                    format!("<b>{}</b>: {}", escape_html(&label), escape_html(cell))
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a full notification: banner line followed by the row body.
pub fn render_message(
    banner: Banner,
    row: &[String],
    headers: &HeaderSet,
    style: RenderStyle,
) -> String {
    let body = render(row, headers, style);
    match style {
        RenderStyle::Rich => format!("*{}*\n{body}", banner.text()),
        RenderStyle::Plain => format!("<b>{}</b>\n{body}", escape_html(banner.text())),
    }
}

pub fn render_both(banner: Banner, row: &[String], headers: &HeaderSet) -> RenderedRow {
    RenderedRow {
        rich: render_message(banner, row, headers, RenderStyle::Rich),
        plain: render_message(banner, row, headers, RenderStyle::Plain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> HeaderSet {
        HeaderSet::new(names.iter().map(|s| s.to_string()).collect())
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rich_without_special_chars_is_untouched() {
        let out = render(
            &row(&["Alice", "O'Brien"]),
            &headers(&["Name", "City"]),
            RenderStyle::Rich,
        );
        assert_eq!(out, "*Name:* Alice\n*City:* O'Brien");
    }

    #[test]
    fn dots_and_bangs_escaped_in_rich_only() {
        let r = row(&["Hi. Welcome!"]);
        let h = headers(&["Note"]);
        assert_eq!(render(&r, &h, RenderStyle::Rich), r"*Note:* Hi\. Welcome\!");
        assert_eq!(render(&r, &h, RenderStyle::Plain), "<b>Note</b>: Hi. Welcome!");
    }

    #[test]
    fn escapes_labels_and_full_markdown_set() {
        assert_eq!(
            escape_markdown_v2("_[]()~`>#+-={}.!?:"),
            r"\_\[\]\(\)\~\`\>\#\+\-\=\{\}\.\!\?\:"
        );
        assert_eq!(escape_markdown_v2(r"a*b|c\d"), r"a\*b\|c\\d");

        let out = render(&row(&["x"]), &headers(&["E-mail (work)"]), RenderStyle::Rich);
        assert_eq!(out, r"*E\-mail \(work\):* x");
    }

    #[test]
    fn html_escapes_only_amp_lt_gt() {
        assert_eq!(escape_html(r#"<a & "b">"#), r#"&lt;a &amp; "b"&gt;"#);
        let out = render(&row(&["1 < 2"]), &headers(&["Q&A"]), RenderStyle::Plain);
        assert_eq!(out, "<b>Q&amp;A</b>: 1 &lt; 2");
    }

    #[test]
    fn extra_cells_get_positional_labels() {
        let out = render(&row(&["a", "b", "c"]), &headers(&["First"]), RenderStyle::Plain);
        assert_eq!(
            out,
            "<b>First</b>: a\n<b>Column 2</b>: b\n<b>Column 3</b>: c"
        );
    }

    #[test]
    fn banner_prefixes_message_in_both_styles() {
        let rendered = render_both(Banner::RecentEntry, &row(&["Alice"]), &headers(&["Name"]));
        assert_eq!(rendered.rich, "*Recent Entry:*\n*Name:* Alice");
        assert_eq!(rendered.plain, "<b>Recent Entry:</b>\n<b>Name</b>: Alice");
    }

    #[test]
    fn render_is_deterministic() {
        let r = row(&["v.1", "<x>"]);
        let h = headers(&["a", "b"]);
        assert_eq!(render_both(Banner::NewEntry, &r, &h), render_both(Banner::NewEntry, &r, &h));
    }
}
