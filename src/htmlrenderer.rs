//! Renders markdown [`Event`]s into HTML. This is largely modeled after
//! [`pulldown_cmark`]'s private `HtmlWriter`, with a few differences:
//!
//! * headings carry an `id` attribute derived from their text (slugified and
//!   de-duplicated within one document), so they can be linked to;
//! * soft breaks (single newlines inside a paragraph) render as `<br />`;
//! * image alt text is collected from the image's inner text rather than
//!   rendered as markup.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Tag};
use std::collections::HashMap;
use std::io;

/// The id given to headings whose text slugifies to nothing.
const FALLBACK_HEADING_ID: &str = "heading";

enum TableState {
    Head,
    Body,
}

/// A heading whose opening tag hasn't been written yet because its `id`
/// depends on text we haven't seen.
struct PendingHeading {
    level: u32,
    start: usize,
    text: String,
}

/// An image whose inner events are being collected as alt text.
struct PendingImage<'a> {
    dest: CowStr<'a>,
    title: CowStr<'a>,
    alt: String,
    depth: usize,
}

pub struct HtmlRenderer<'a> {
    out: String,
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,
    heading: Option<PendingHeading>,
    image: Option<PendingImage<'a>>,
    heading_ids: HashMap<String, usize>,
    footnote_numbers: HashMap<String, usize>,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new() -> Self {
        HtmlRenderer {
            out: String::new(),
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            heading: None,
            image: None,
            heading_ids: HashMap::new(),
            footnote_numbers: HashMap::new(),
        }
    }

    /// Consumes the renderer and returns the HTML written so far.
    pub fn finish(self) -> String {
        self.out
    }

    pub fn on_event(&mut self, event: Event<'a>) -> io::Result<()> {
        if self.image.is_some() {
            return self.on_image_event(event);
        }

        match event {
            Event::Start(tag) => self.on_start(tag),
            Event::End(tag) => self.on_end(tag),
            Event::Code(code) => self.on_code(code),
            Event::FootnoteReference(name) => self.on_footnote_reference(name),
            Event::HardBreak => self.on_break(),
            Event::Html(html) => self.on_html(html),
            Event::Rule => self.on_rule(),
            Event::SoftBreak => self.on_break(),
            Event::TaskListMarker(checked) => self.on_task_list_marker(checked),
            Event::Text(text) => self.on_text(text),
        }
    }

    fn on_image_event(&mut self, event: Event<'a>) -> io::Result<()> {
        let image = match self.image.as_mut() {
            Some(image) => image,
            None => return Ok(()),
        };

        match event {
            Event::Start(Tag::Image(..)) => image.depth += 1,
            Event::End(Tag::Image(..)) => {
                if image.depth == 0 {
                    return self.close_image();
                }
                image.depth -= 1;
            }
            Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
            _ => {}
        }
        Ok(())
    }

    fn close_image(&mut self) -> io::Result<()> {
        let image = match self.image.take() {
            Some(image) => image,
            None => return Ok(()),
        };

        self.out.write_str(r#"<img src=""#)?;
        escape_href(&mut self.out, &image.dest)?;
        self.out.write_str(r#"" alt=""#)?;
        escape_html(&mut self.out, &image.alt)?;
        if !image.title.is_empty() {
            self.out.write_str(r#"" title=""#)?;
            escape_html(&mut self.out, &image.title)?;
        }
        self.out.write_str(r#"" />"#)
    }

    fn on_start(&mut self, tag: Tag<'a>) -> io::Result<()> {
        let w = &mut self.out;
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(kind) => match kind {
                CodeBlockKind::Fenced(info) => {
                    let lang = info.split(' ').next().unwrap_or("");
                    match lang.is_empty() {
                        true => w.write_str("<pre><code>"),
                        false => {
                            w.write_str(r#"<pre><code class="language-"#)?;
                            escape_html(&mut *w, lang)?;
                            w.write_str(r#"">"#)
                        }
                    }
                }
                CodeBlockKind::Indented => w.write_str("<pre><code>"),
            },
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => {
                let number = self.footnote_number(&name);
                let w = &mut self.out;
                w.write_str(r#"<div class="footnote-definition" id="fn-"#)?;
                escape_html(&mut *w, &name)?;
                write!(
                    w,
                    r#""><sup class="footnote-definition-label">{}</sup>"#,
                    number
                )
            }
            Tag::Heading(level) => {
                self.heading = Some(PendingHeading {
                    level,
                    start: self.out.len(),
                    text: String::new(),
                });
                Ok(())
            }
            Tag::Image(_link_type, dest, title) => {
                self.image = Some(PendingImage {
                    dest,
                    title,
                    alt: String::new(),
                    depth: 0,
                });
                Ok(())
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(link_type, dest, title) => {
                w.write_str(r#"<a href=""#)?;
                if let LinkType::Email = link_type {
                    w.write_str("mailto:")?;
                }
                escape_href(&mut *w, &dest)?;
                if !title.is_empty() {
                    w.write_str(r#"" title=""#)?;
                    escape_html(&mut *w, &title)?;
                }
                w.write_str(r#"">"#)
            }
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => write!(w, "<ol start=\"{}\">\n", start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" style="text-align: left""#,
                    Some(Alignment::Right) => r#" style="text-align: right""#,
                    Some(Alignment::Center) => r#" style="text-align: center""#,
                    _ => "",
                }
            ),
        }
    }

    fn on_end(&mut self, tag: Tag) -> io::Result<()> {
        let w = &mut self.out;
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => w.write_str("</code></pre>\n"),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Heading(_) => self.close_heading(),
            // images are closed in `on_image_event`
            Tag::Image(_, _, _) => Ok(()),
            Tag::Item => w.write_str("</li>\n"),
            Tag::Link(_, _, _) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>")
            }
            Tag::TableRow => w.write_str("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }

    fn close_heading(&mut self) -> io::Result<()> {
        let heading = match self.heading.take() {
            Some(heading) => heading,
            None => return Ok(()),
        };

        let id = self.unique_heading_id(slug::slugify(&heading.text));
        let mut open = String::new();
        write!(open, "<h{} id=\"", heading.level)?;
        escape_html(&mut open, &id)?;
        open.write_str("\">")?;
        self.out.insert_str(heading.start, &open);
        write!(self.out, "</h{}>\n", heading.level)
    }

    /// Returns `base` the first time it's seen and `{base}-{n}` thereafter.
    fn unique_heading_id(&mut self, base: String) -> String {
        let base = match base.is_empty() {
            true => FALLBACK_HEADING_ID.to_owned(),
            false => base,
        };
        let seen = self.heading_ids.entry(base.clone()).or_insert(0);
        let id = match *seen {
            0 => base,
            n => format!("{}-{}", base, n),
        };
        *seen += 1;
        id
    }

    fn footnote_number(&mut self, name: &str) -> usize {
        let next = self.footnote_numbers.len() + 1;
        *self.footnote_numbers.entry(name.to_owned()).or_insert(next)
    }

    fn on_footnote_reference(&mut self, name: CowStr) -> io::Result<()> {
        let number = self.footnote_number(&name);
        let w = &mut self.out;
        w.write_str(r##"<sup class="footnote-reference"><a href="#fn-"##)?;
        escape_html(&mut *w, &name)?;
        write!(w, r#"">{}</a></sup>"#, number)
    }

    fn on_text(&mut self, text: CowStr) -> io::Result<()> {
        if let Some(heading) = self.heading.as_mut() {
            heading.text.push_str(&text);
        }
        escape_html(&mut self.out, &text)
    }

    fn on_code(&mut self, code: CowStr) -> io::Result<()> {
        if let Some(heading) = self.heading.as_mut() {
            heading.text.push_str(&code);
        }
        self.out.write_str("<code>")?;
        escape_html(&mut self.out, &code)?;
        self.out.write_str("</code>")
    }

    fn on_html(&mut self, html: CowStr) -> io::Result<()> {
        self.out.write_str(&html)
    }

    fn on_break(&mut self) -> io::Result<()> {
        self.out.write_str("<br />\n")
    }

    fn on_rule(&mut self) -> io::Result<()> {
        self.out.write_str("<hr />\n")
    }

    fn on_task_list_marker(&mut self, checked: bool) -> io::Result<()> {
        write!(
            self.out,
            r#"<input disabled="" type="checkbox" {}/>"#,
            match checked {
                true => r#"checked="" "#,
                false => "",
            }
        )
    }
}

impl Default for HtmlRenderer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pulldown_cmark::{Options, Parser};

    fn render(markdown: &str) -> String {
        let mut renderer = HtmlRenderer::new();
        for event in Parser::new_ext(markdown, Options::all()) {
            renderer.on_event(event).unwrap();
        }
        renderer.finish()
    }

    #[test]
    fn test_heading_ids_are_deduplicated() {
        let html = render("## Setup\n\n## Setup\n\n## Setup");
        assert!(html.contains(r#"<h2 id="setup">Setup</h2>"#), "{}", html);
        assert!(html.contains(r#"<h2 id="setup-1">Setup</h2>"#), "{}", html);
        assert!(html.contains(r#"<h2 id="setup-2">Setup</h2>"#), "{}", html);
    }

    #[test]
    fn test_heading_id_includes_inline_code() {
        let html = render("# Using `cargo` today");
        assert!(
            html.contains(r#"<h1 id="using-cargo-today">Using <code>cargo</code> today</h1>"#),
            "{}",
            html
        );
    }

    #[test]
    fn test_heading_without_slug_text() {
        let html = render("# ???");
        assert!(html.contains(r#"<h1 id="heading">"#), "{}", html);
    }

    #[test]
    fn test_image_alt_text() {
        let html = render(r#"![a *small* cat](cat.png "Kitty")"#);
        assert!(
            html.contains(r#"<img src="cat.png" alt="a small cat" title="Kitty" />"#),
            "{}",
            html
        );
    }

    #[test]
    fn test_fenced_code_language() {
        let html = render("```rust\nfn main() {}\n```");
        assert!(
            html.contains(r#"<pre><code class="language-rust">fn main() {}"#),
            "{}",
            html
        );
    }

    #[test]
    fn test_soft_break_renders_line_break() {
        let html = render("one\ntwo");
        assert_eq!("<p>one<br />\ntwo</p>\n", html);
    }

    #[test]
    fn test_footnotes_are_numbered_in_order() {
        let html = render("Alpha[^a] and beta[^b].\n\n[^b]: Second.\n\n[^a]: First.");
        assert!(html.contains(r##"<a href="#fn-a">1</a>"##), "{}", html);
        assert!(html.contains(r##"<a href="#fn-b">2</a>"##), "{}", html);
        assert!(html.contains(r#"id="fn-b"><sup class="footnote-definition-label">2</sup>"#));
    }
}
