//! Readme rendering: markdown events flattened into styled terminal lines.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

use crate::app::Theme;

/// Render `source` as styled lines for the readme pane.
pub(crate) fn readme_lines(theme: &Theme, source: &str) -> Vec<Line<'static>> {
    let mut out = Writer::new(theme);
    for event in Parser::new(source) {
        out.event(event);
    }
    out.finish()
}

struct Writer<'a> {
    theme: &'a Theme,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    heading: Option<HeadingLevel>,
    code_block: bool,
    emphasis: usize,
    strong: usize,
    // One entry per open list; `Some(n)` is the next ordinal of a numbered list.
    lists: Vec<Option<u64>>,
}

impl<'a> Writer<'a> {
    fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            lines: Vec::new(),
            spans: Vec::new(),
            heading: None,
            code_block: false,
            emphasis: 0,
            strong: 0,
            lists: Vec::new(),
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.heading = Some(level);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush();
                self.heading = None;
                self.blank();
            }
            Event::End(TagEnd::Paragraph) => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.flush();
                self.code_block = false;
                self.blank();
            }
            Event::Start(Tag::List(start)) => {
                self.flush();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.spans.push(Span::styled(
                    format!("{indent}{marker}"),
                    Style::default().fg(self.theme.accent),
                ));
            }
            Event::End(TagEnd::Item) => self.flush(),
            Event::Start(Tag::Emphasis) => self.emphasis += 1,
            Event::End(TagEnd::Emphasis) => self.emphasis = self.emphasis.saturating_sub(1),
            Event::Start(Tag::Strong) => self.strong += 1,
            Event::End(TagEnd::Strong) => self.strong = self.strong.saturating_sub(1),
            Event::Text(text) if self.code_block => {
                for (i, part) in text.split('\n').enumerate() {
                    if i > 0 {
                        self.break_line();
                    }
                    if !part.is_empty() {
                        self.spans
                            .push(Span::styled(format!("  {part}"), self.code_style()));
                    }
                }
            }
            Event::Text(text) => {
                let style = self.text_style();
                self.spans.push(Span::styled(text.to_string(), style));
            }
            Event::Code(code) => {
                self.spans
                    .push(Span::styled(code.to_string(), self.code_style()));
            }
            Event::SoftBreak => self.spans.push(Span::raw(" ")),
            Event::HardBreak => self.break_line(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(self.theme.muted),
                )));
                self.blank();
            }
            _ => {}
        }
    }

    fn text_style(&self) -> Style {
        let mut style = Style::default();
        if let Some(level) = self.heading {
            style = style.fg(self.theme.accent).add_modifier(Modifier::BOLD);
            if level == HeadingLevel::H1 {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
        }
        if self.strong > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.emphasis > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        style
    }

    fn code_style(&self) -> Style {
        Style::default().fg(self.theme.success)
    }

    /// End the current line, even when it is empty.
    fn break_line(&mut self) {
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            self.break_line();
        }
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| !line.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
