use crate::htmlrenderer::HtmlRenderer;
use pulldown_cmark::{Options, Parser};
use std::io;

/// The fixed set of markdown extensions every document is rendered with.
pub fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts markdown to HTML. Headings get slug `id`s and single newlines
/// become `<br />`; see [`HtmlRenderer`].
pub fn to_html(markdown: &str) -> io::Result<String> {
    let mut renderer = HtmlRenderer::new();
    for event in Parser::new_ext(markdown, options()) {
        renderer.on_event(event)?;
    }
    Ok(renderer.finish())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_strikethrough() -> io::Result<()> {
        assert_eq!("<p><del>x</del></p>\n", to_html("~~x~~")?);
        Ok(())
    }

    #[test]
    fn test_table() -> io::Result<()> {
        let html = to_html("| Col1 | Col2 |\n|------|------|\n| A    | B    |")?;
        assert!(html.starts_with("<table><thead><tr><th>Col1</th>"), "{}", html);
        assert!(html.contains("<tbody><tr><td>A</td><td>B</td></tr>"), "{}", html);
        Ok(())
    }

    #[test]
    fn test_smart_punctuation() -> io::Result<()> {
        let html = to_html(r#""Hello" -- it's done..."#)?;
        assert!(html.contains("\u{201c}Hello\u{201d}"), "{}", html);
        assert!(html.contains("it\u{2019}s"), "{}", html);
        assert!(html.contains('\u{2026}'), "{}", html);
        Ok(())
    }

    #[test]
    fn test_task_list() -> io::Result<()> {
        let html = to_html("- [x] done\n- [ ] todo")?;
        assert!(html.contains(r#"type="checkbox" checked="" />"#), "{}", html);
        Ok(())
    }
}
