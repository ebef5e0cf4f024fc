//! Markdown tokenizer
//!
//! One CommonMark pass turns a document into a flat, offset-tagged token
//! stream. Structural rules (headings, links, images) only ever look at the
//! stream, so code blocks and code spans are excluded once, here.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as MdParser, Tag, TagEnd};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Heading { level: u8, text: String },
    Link { dest: String },
    Image { dest: String },
    CodeBlock { fenced: bool },
    CodeSpan,
    Html { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the source document.
    pub range: Range<usize>,
    /// 1-based line of `range.start`.
    pub line: usize,
}

struct PendingHeading {
    level: u8,
    text: String,
    range: Range<usize>,
}

/// Tokenize a markdown document.
pub fn tokenize(source: &str) -> Vec<Token> {
    let lines = LineIndex::new(source);
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = MdParser::new_ext(source, options).into_offset_iter();

    let mut tokens = Vec::new();
    let mut heading: Option<PendingHeading> = None;
    let push = |tokens: &mut Vec<Token>, kind: TokenKind, range: Range<usize>| {
        let line = lines.line_of(range.start);
        tokens.push(Token { kind, range, line });
    };

    for (event, range) in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some(PendingHeading { level: level as u8, text: String::new(), range });
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(h) = heading.take() {
                    let text = h.text.trim().to_string();
                    push(&mut tokens, TokenKind::Heading { level: h.level, text }, h.range);
                }
            }
            Event::Text(text) => {
                if let Some(h) = heading.as_mut() {
                    h.text.push_str(&text);
                }
            }
            Event::Code(code) => {
                if let Some(h) = heading.as_mut() {
                    h.text.push_str(&code);
                }
                push(&mut tokens, TokenKind::CodeSpan, range);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let fenced = matches!(kind, CodeBlockKind::Fenced(_));
                push(&mut tokens, TokenKind::CodeBlock { fenced }, range);
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                push(&mut tokens, TokenKind::Link { dest: dest_url.to_string() }, range);
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                push(&mut tokens, TokenKind::Image { dest: dest_url.to_string() }, range);
            }
            Event::Html(raw) | Event::InlineHtml(raw) => {
                push(&mut tokens, TokenKind::Html { raw: raw.to_string() }, range);
            }
            _ => {}
        }
    }

    tokens
}

/// Headings as `(level, text, line)`.
pub fn headings(tokens: &[Token]) -> impl Iterator<Item = (u8, &str, usize)> {
    tokens.iter().filter_map(|t| match &t.kind {
        TokenKind::Heading { level, text } => Some((*level, text.as_str(), t.line)),
        _ => None,
    })
}

/// Byte ranges covered by code blocks and code spans.
pub fn code_ranges(tokens: &[Token]) -> Vec<Range<usize>> {
    tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::CodeBlock { .. } | TokenKind::CodeSpan))
        .map(|t| t.range.clone())
        .collect()
}

pub fn in_ranges(ranges: &[Range<usize>], offset: usize) -> bool {
    ranges.iter().any(|r| r.contains(&offset))
}

/// Maps byte offsets to 1-based line numbers.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_with_levels_and_lines() {
        let src = "# Title\n\nText\n\n## Section `code`\n";
        let tokens = tokenize(src);
        let hs: Vec<_> = headings(&tokens).collect();
        assert_eq!(hs, vec![(1, "Title", 1), (2, "Section code", 5)]);
    }

    #[test]
    fn test_code_is_not_scanned() {
        let src = "Intro\n\n```md\n# not a heading\n[x](/nope)\n```\n\n    ![i](indented.png)\n\nUse `[a](/b)` inline.\n";
        let tokens = tokenize(src);
        assert_eq!(headings(&tokens).count(), 0);
        assert!(!tokens.iter().any(|t| matches!(t.kind, TokenKind::Link { .. })));
        assert!(!tokens.iter().any(|t| matches!(t.kind, TokenKind::Image { .. })));
        assert_eq!(code_ranges(&tokens).len(), 3);
    }

    #[test]
    fn test_links_and_images() {
        let src = "See [a](/a) and ![pic](./pic.png).\n\n[ref]: /ignored\n";
        let tokens = tokenize(src);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::Link { dest: "/a".into() }));
        assert!(kinds.contains(&TokenKind::Image { dest: "./pic.png".into() }));
    }

    #[test]
    fn test_html_comment_token() {
        let src = "Text\n\n<!-- afs:image id=\"x\" desc=\"d\" -->\n";
        let tokens = tokenize(src);
        assert!(tokens.iter().any(|t| matches!(&t.kind, TokenKind::Html { raw } if raw.contains("afs:image"))));
    }

    #[test]
    fn test_line_index() {
        let idx = LineIndex::new("a\nb\nc");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 2);
        assert_eq!(idx.line_of(4), 3);
    }
}
