use chrono::Utc;
use elbatui_core::{
    models::{timeago, VersionView},
    remote::RemoteData,
    ApiError, Route, SessionState,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::{
    app::{ElbaApp, HomeFocus, Theme},
    markdown::readme_lines,
};

impl ElbaApp {
    pub(crate) fn draw(&mut self, frame: &mut Frame) {
        let size = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(6),
                Constraint::Length(3),
            ])
            .split(size);

        self.render_header(frame, chunks[0]);
        match self.browser.route().clone() {
            Route::Home => self.draw_home(frame, chunks[1]),
            Route::Search { query } => self.draw_search(frame, chunks[1], &query),
            Route::Package { .. } => self.draw_package(frame, chunks[1]),
            Route::Profile => self.draw_profile(frame, chunks[1]),
        }
        self.render_status(frame, chunks[2]);

        if let Some(prompt) = &self.prompt {
            self.render_prompt(frame, prompt);
        }
        if let Some(notice) = &self.notice {
            self.render_notice(frame, notice.title, &notice.lines);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let session = match &self.session_state {
            SessionState::Unknown => Span::styled("…", Style::default().fg(self.theme.muted)),
            SessionState::Anonymous => Span::styled(
                "not logged in (l: login, o: GitHub)",
                Style::default().fg(self.theme.muted),
            ),
            SessionState::Authenticated(user) => Span::styled(
                format!("● {}", user.name),
                Style::default().fg(self.theme.success),
            ),
        };
        let line = Line::from(vec![
            Span::styled(
                " elba ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.browser.route().title(),
                Style::default().fg(self.theme.primary_fg),
            ),
            Span::raw("  "),
            session,
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_home(&mut self, frame: &mut Frame, area: Rect) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);
        let stats = remote_lines(
            &self.theme,
            self.browser.home.stats.state(),
            self.state.spinner(),
            |stats| {
                vec![Line::from(format!(
                    "{} packages · {} downloads",
                    stats.package_count, stats.download_count
                ))]
            },
        );
        frame.render_widget(
            Paragraph::new(stats).block(Block::default().borders(Borders::ALL).title("Registry")),
            sections[0],
        );

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(sections[1]);

        let focus = self.state.home_focus;
        let groups = slot_rows(self.browser.home.groups.state(), |groups| {
            groups.iter().map(|g| g.group.clone()).collect()
        });
        self.render_list(frame, columns[0], "Groups", groups, focus == HomeFocus::Groups);

        let title = match (&self.browser.home.selected_group, self.browser.home.group.ready()) {
            (Some(_), Some(group)) => format!(
                "Packages in {} (created {} ago)",
                group.group,
                timeago(group.created_at, Utc::now())
            ),
            (Some(group), None) => format!("Packages in {}", group.group),
            (None, _) => "Packages (Enter on a group)".to_string(),
        };
        let packages = slot_rows(self.browser.home.group_packages.state(), |packages| {
            packages.iter().map(|p| p.to_string()).collect()
        });
        self.render_list(frame, columns[1], &title, packages, focus == HomeFocus::Packages);
    }

    fn draw_search(&mut self, frame: &mut Frame, area: Rect, query: &str) {
        let results = slot_rows(self.browser.search.results.state(), |results| {
            results.iter().map(|p| p.to_string()).collect()
        });
        let title = format!("Results for \"{query}\"");
        self.render_list(frame, area, &title, results, true);
    }

    fn draw_package(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),
                Constraint::Length(8),
                Constraint::Length(6),
            ])
            .split(columns[0]);

        let theme = &self.theme;
        let spinner = self.state.spinner();
        let page = &self.browser.package;

        let mut info = remote_lines(theme, page.version.state(), spinner, |v| {
            version_lines(theme, v)
        });
        info.push(Line::from(""));
        info.extend(remote_lines(theme, page.stats.state(), spinner, |stats| {
            vec![Line::from(format!(
                "Downloads: {} total, {} this season",
                stats.total, stats.season
            ))]
        }));
        if let Some(err) = page.package.state().error() {
            info.insert(0, danger_line(theme, err));
        }
        frame.render_widget(
            Paragraph::new(info)
                .block(Block::default().borders(Borders::ALL).title("Package"))
                .wrap(Wrap { trim: true }),
            left[0],
        );

        let dependencies = remote_lines(theme, page.dependencies.state(), spinner, |deps| {
            if deps.is_empty() {
                return vec![muted_line(theme, "No dependencies")];
            }
            deps.iter()
                .map(|d| Line::from(format!("{}/{} {}", d.group, d.package, d.version_req)))
                .collect()
        });
        let readme = remote_lines(theme, page.readme.state(), spinner, |text| {
            if text.trim().is_empty() {
                return vec![muted_line(theme, "No readme")];
            }
            readme_lines(theme, text)
        });
        frame.render_widget(
            Paragraph::new(dependencies)
                .block(Block::default().borders(Borders::ALL).title("Dependencies"))
                .wrap(Wrap { trim: true }),
            left[2],
        );
        frame.render_widget(
            Paragraph::new(readme)
                .block(Block::default().borders(Borders::ALL).title("Readme"))
                .wrap(Wrap { trim: false }),
            columns[1],
        );

        let versions = slot_rows(page.versions.state(), |versions| {
            versions.iter().map(|v| v.version.clone()).collect()
        });
        self.render_list(frame, left[1], "Versions", versions, true);
    }

    fn draw_profile(&mut self, frame: &mut Frame, area: Rect) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(4)])
            .split(area);

        let theme = &self.theme;
        let mut lines = match &self.session_state {
            SessionState::Unknown => vec![muted_line(theme, "Checking session…")],
            SessionState::Anonymous => vec![muted_line(
                theme,
                "Not logged in. Press l to log in with an access token or o for GitHub.",
            )],
            SessionState::Authenticated(user) => {
                let mut lines = vec![Line::from(Span::styled(
                    user.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ))];
                if let Some(email) = &user.email {
                    lines.push(Line::from(email.clone()));
                }
                lines.push(muted_line(theme, "c: create token · d: delete selected token"));
                lines
            }
        };
        let tokens = &self.browser.profile.tokens;
        if let Some(err) = tokens.creating().state().error() {
            lines.push(danger_line(theme, err));
        }
        if let Some(err) = tokens.deleting().state().error() {
            lines.push(danger_line(theme, err));
        }
        if tokens.creating().state().is_loading() || tokens.deleting().state().is_loading() {
            lines.push(Line::from(format!("{} Working…", self.state.spinner())));
        }
        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Profile"))
                .wrap(Wrap { trim: true }),
            sections[0],
        );

        let now = Utc::now();
        let list = slot_rows(tokens.tokens().state(), |tokens| {
            tokens
                .iter()
                .map(|t| {
                    format!(
                        "#{} {}  created {} ago",
                        t.id,
                        t.token_partial,
                        timeago(t.created_at, now)
                    )
                })
                .collect()
        });
        self.render_list(frame, sections[1], "Access tokens", list, true);
    }

    /// Render a fetch-backed list, one branch per loading state.
    fn render_list(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        items: RemoteData<Vec<String>, String>,
        focused: bool,
    ) {
        let border = if focused {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title.to_string());

        let entries = match items {
            RemoteData::Ready(entries) if !entries.is_empty() => entries,
            RemoteData::Ready(_) => {
                let lines = vec![muted_line(&self.theme, "No results")];
                frame.render_widget(Paragraph::new(lines).block(block), area);
                return;
            }
            other => {
                let lines = remote_lines(&self.theme, &other, self.state.spinner(), |_| Vec::new());
                frame.render_widget(
                    Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
                    area,
                );
                return;
            }
        };

        let mut list_state = ListState::default();
        if focused {
            self.state.list_height = area.height.saturating_sub(2) as usize;
            self.state.clamp_cursor(entries.len());
            self.state.ensure_cursor_visible(entries.len());
            *list_state.offset_mut() = self.state.offset;
            list_state.select(Some(self.state.cursor));
        }
        let items: Vec<ListItem> = entries
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let selected = focused && idx == self.state.cursor;
                let marker = if selected {
                    Span::styled(
                        "▶ ",
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw("  ")
                };
                ListItem::new(Line::from(vec![
                    marker,
                    Span::styled(row, Style::default().fg(self.theme.primary_fg)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let back = if self.browser.can_go_back() { "Esc back · " } else { "" };
        let help = format!("{back}/ search · h home · p profile · r reload · q quit");
        let line = Line::from(vec![
            Span::raw(self.state.status.clone()),
            Span::raw("  "),
            Span::styled(help, Style::default().fg(self.theme.muted)),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_prompt(&self, frame: &mut Frame, prompt: &crate::prompt::PromptModal) {
        let height = prompt.fields.len() as u16 * 2 + 2;
        let area = centered_rect(60, height, frame.size());
        frame.render_widget(Clear, area);

        let mut lines = Vec::new();
        for (idx, field) in prompt.fields.iter().enumerate() {
            let style = if idx == prompt.focus {
                Style::default().fg(self.theme.accent)
            } else {
                Style::default().fg(self.theme.muted)
            };
            lines.push(Line::from(Span::styled(field.label, style)));
            lines.push(Line::from(format!("> {}", field.display())));
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(prompt.title())
            .border_style(Style::default().fg(self.theme.warning));
        frame.render_widget(Paragraph::new(lines).block(block), area);

        let field = &prompt.fields[prompt.focus.min(prompt.fields.len() - 1)];
        let cursor_x = (area.x + 3 + field.cursor() as u16).min(area.x + area.width.saturating_sub(2));
        let cursor_y = area.y + 2 + prompt.focus as u16 * 2;
        frame.set_cursor(cursor_x, cursor_y);
    }

    fn render_notice(&self, frame: &mut Frame, title: &str, lines: &[String]) {
        let height = lines.len() as u16 + 3;
        let area = centered_rect(72, height, frame.size());
        frame.render_widget(Clear, area);
        let mut content: Vec<Line> = lines.iter().map(|l| Line::from(l.clone())).collect();
        content.push(muted_line(&self.theme, "Press any key to close"));
        let paragraph = Paragraph::new(content)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title.to_string())
                    .border_style(Style::default().fg(self.theme.accent)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }
}

fn remote_lines<T, E: std::fmt::Display>(
    theme: &Theme,
    state: &RemoteData<T, E>,
    spinner: char,
    ready: impl FnOnce(&T) -> Vec<Line<'static>>,
) -> Vec<Line<'static>> {
    match state {
        RemoteData::NotAsked => vec![muted_line(theme, "Not loaded")],
        RemoteData::Loading => vec![Line::from(Span::styled(
            format!("{spinner} Loading…"),
            Style::default().fg(theme.accent),
        ))],
        RemoteData::Failed(err) => vec![danger_line(theme, err)],
        RemoteData::Ready(value) => ready(value),
    }
}

/// Flatten a slot into display rows, keeping its loading state.
fn slot_rows<T>(
    state: &RemoteData<T, ApiError>,
    render: impl FnOnce(&T) -> Vec<String>,
) -> RemoteData<Vec<String>, String> {
    match state {
        RemoteData::NotAsked => RemoteData::NotAsked,
        RemoteData::Loading => RemoteData::Loading,
        RemoteData::Failed(err) => RemoteData::Failed(err.to_string()),
        RemoteData::Ready(value) => RemoteData::Ready(render(value)),
    }
}

fn version_lines(theme: &Theme, version: &VersionView) -> Vec<Line<'static>> {
    let mut title = vec![Span::styled(
        format!("{}/{} {}", version.group, version.package, version.version),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if version.yanked {
        title.push(Span::styled(" (yanked)", Style::default().fg(theme.warning)));
    }
    let mut lines = vec![Line::from(title)];
    if let Some(description) = &version.description {
        lines.push(Line::from(description.clone()));
    }
    let fields = [
        ("License", version.license.as_ref()),
        ("Homepage", version.homepage.as_ref()),
        ("Repository", version.repository.as_ref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            lines.push(Line::from(format!("{label}: {value}")));
        }
    }
    if !version.keywords.is_empty() {
        lines.push(Line::from(format!("Keywords: {}", version.keywords.join(", "))));
    }
    if !version.owners.is_empty() {
        let owners: Vec<&str> = version.owners.iter().map(|o| o.name.as_str()).collect();
        lines.push(Line::from(format!("Owners: {}", owners.join(", "))));
    }
    lines.push(muted_line(
        theme,
        &format!("Published {} ago", timeago(version.created_at, Utc::now())),
    ));
    lines
}

fn muted_line(theme: &Theme, text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(theme.muted)))
}

fn danger_line(theme: &Theme, err: impl std::fmt::Display) -> Line<'static> {
    Line::from(Span::styled(
        format!("✖ {err}"),
        Style::default()
            .fg(theme.danger)
            .add_modifier(Modifier::BOLD),
    ))
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use elbatui_core::{RegistryClient, SessionStore};
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    use super::*;

    fn app() -> ElbaApp {
        let client = RegistryClient::with_base_url("http://registry.test/api/v1")
            .expect("valid base url");
        let session = Arc::new(SessionStore::new(Arc::new(client.clone())));
        ElbaApp::new(client, session, Route::Home)
    }

    fn draw_list(app: &mut ElbaApp, items: RemoteData<Vec<String>, String>) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(32, 5)).expect("test terminal");
        terminal
            .draw(|frame| {
                let area = frame.size();
                app.render_list(frame, area, "Results", items, true);
            })
            .expect("draw");
        terminal.backend().buffer().clone()
    }

    fn screen(buffer: &Buffer) -> String {
        let area = buffer.area;
        (0..area.height)
            .map(|y| (0..area.width).map(|x| buffer.get(x, y).symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn list_states_render_distinctly() {
        let mut app = app();
        app.state.tick = 1;
        let spinner = format!("{} Loading", app.state.spinner());

        let not_asked = screen(&draw_list(&mut app, RemoteData::NotAsked));
        assert!(not_asked.contains("Not loaded"));

        let loading = screen(&draw_list(&mut app, RemoteData::Loading));
        assert!(loading.contains(&spinner));
        assert!(!loading.contains("No results"));

        let failed = screen(&draw_list(
            &mut app,
            RemoteData::Failed("registry unavailable".to_string()),
        ));
        assert!(failed.contains("✖ registry unavailable"));

        let empty = screen(&draw_list(&mut app, RemoteData::Ready(Vec::new())));
        assert!(empty.contains("No results"));

        let filled = screen(&draw_list(
            &mut app,
            RemoteData::Ready(vec!["idris-community/lightyear".to_string()]),
        ));
        assert!(filled.contains("idris-community/lightyear"));

        for other in [&not_asked, &failed, &empty, &filled] {
            assert!(!other.contains(&spinner));
        }
        for other in [&not_asked, &loading, &failed, &filled] {
            assert!(!other.contains("No results"));
        }
        for other in [&not_asked, &loading, &empty, &filled] {
            assert!(!other.contains('✖'));
        }
    }

    #[test]
    fn failures_use_the_danger_colour() {
        let mut app = app();
        let danger = app.theme.danger;
        let buffer = draw_list(&mut app, RemoteData::Failed("timed out".to_string()));
        let marked: Vec<_> = buffer
            .content
            .iter()
            .filter(|cell| cell.symbol() == "✖")
            .collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].fg, danger);
        assert!(marked[0].modifier.contains(Modifier::BOLD));

        let row = (0..buffer.area.height)
            .find(|&y| (0..buffer.area.width).any(|x| buffer.get(x, y).symbol() == "✖"))
            .expect("error row");
        let text_cells: Vec<_> = (0..buffer.area.width)
            .map(|x| buffer.get(x, row))
            .filter(|cell| !cell.symbol().trim().is_empty() && "timed out".contains(cell.symbol()))
            .collect();
        assert!(!text_cells.is_empty());
        assert!(text_cells.iter().all(|cell| cell.fg == danger));
    }

    #[test]
    fn remote_lines_style_each_state() {
        let theme = Theme::default();
        let loading: RemoteData<(), String> = RemoteData::Loading;
        let lines = remote_lines(&theme, &loading, '-', |_| Vec::new());
        assert_eq!(lines[0].spans[0].content, "- Loading…");
        assert_eq!(lines[0].spans[0].style.fg, Some(theme.accent));

        let failed: RemoteData<(), String> = RemoteData::Failed("bad gateway".into());
        let lines = remote_lines(&theme, &failed, '-', |_| Vec::new());
        assert_eq!(lines[0].spans[0].content, "✖ bad gateway");
        assert_eq!(lines[0].spans[0].style.fg, Some(theme.danger));

        let ready: RemoteData<u32, String> = RemoteData::Ready(7);
        let lines = remote_lines(&theme, &ready, '-', |n| vec![Line::from(n.to_string())]);
        assert_eq!(lines[0].spans[0].content, "7");
    }
}
