use std::{io, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use elbatui_core::{
    browser::{execute as execute_fetch, Fetch, Fetched},
    error::ApiResult,
    Browser, RegistryClient, Route, SessionState, SessionStore,
};
use ratatui::{backend::CrosstermBackend, style::Color, Terminal};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, error, info, warn};

use crate::prompt::{PromptKind, PromptModal};

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub(crate) struct Theme {
    pub primary_fg: Color,
    pub accent: Color,
    pub muted: Color,
    pub selection_bg: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HomeFocus {
    Groups,
    Packages,
}

/// Popup shown until dismissed with any key.
#[derive(Debug, Clone)]
pub(crate) struct Notice {
    pub title: &'static str,
    pub lines: Vec<String>,
}

enum AppEvent {
    Input(Event),
    Tick,
    Fetched(Fetched),
    AuthFinished {
        action: &'static str,
        result: ApiResult<()>,
    },
}

/// Terminal front-end over the registry browser.
pub struct ElbaApp {
    client: RegistryClient,
    session: Arc<SessionStore>,
    pub(crate) browser: Browser,
    pub(crate) session_state: SessionState,
    pub(crate) state: UiState,
    pub(crate) prompt: Option<PromptModal>,
    pub(crate) notice: Option<Notice>,
    pub(crate) theme: Theme,
    start_route: Route,
    event_tx: Option<mpsc::Sender<AppEvent>>,
}

impl ElbaApp {
    pub fn new(client: RegistryClient, session: Arc<SessionStore>, start_route: Route) -> Self {
        Self {
            client,
            session,
            browser: Browser::new(),
            session_state: SessionState::Unknown,
            state: UiState::default(),
            prompt: None,
            notice: None,
            theme: Theme::default(),
            start_route,
            event_tx: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        let mut session_rx = self.session.subscribe();
        self.spawn_session_refresh();
        let start = self.start_route.clone();
        self.navigate(start);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                Ok(()) = session_rx.changed() => {
                    let snapshot = session_rx.borrow_and_update().clone();
                    self.handle_session(snapshot);
                }
            }

            if self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Release {
                        self.handle_key(key);
                    }
                }
                true
            }
            Some(AppEvent::Tick) => {
                self.state.tick = self.state.tick.wrapping_add(1);
                true
            }
            Some(AppEvent::Fetched(fetched)) => {
                self.handle_fetched(fetched);
                true
            }
            Some(AppEvent::AuthFinished { action, result }) => {
                match result {
                    Ok(()) => self.state.set_status(format!("{action} succeeded")),
                    Err(err) => {
                        error!(%err, action, "authentication request failed");
                        self.state.set_status(format!("{action} failed: {err}"));
                    }
                }
                true
            }
            None => false,
        }
    }

    fn handle_session(&mut self, snapshot: SessionState) {
        match &snapshot {
            SessionState::Authenticated(user) => {
                info!(user = %user.name, "session changed");
                self.state.set_status(format!("Logged in as {}", user.name));
            }
            SessionState::Anonymous => self.state.set_status("Not logged in".to_string()),
            SessionState::Unknown => {}
        }
        let fetches = self.browser.set_session(&snapshot);
        self.session_state = snapshot;
        self.dispatch(fetches);
    }

    fn handle_fetched(&mut self, fetched: Fetched) {
        let failed = fetched.is_err();
        let fetches = self.browser.apply(fetched);
        if let Some(secret) = self.browser.profile.tokens.take_revealed() {
            self.notice = Some(Notice {
                title: "New access token",
                lines: vec![
                    "Copy this token now; it will not be shown again:".to_string(),
                    String::new(),
                    secret,
                ],
            });
        }
        if failed {
            self.state
                .set_status("A request failed; details are shown in place".to_string());
        }
        self.state.clamp_cursor(self.selectable_len());
        self.dispatch(fetches);
    }

    fn dispatch(&self, fetches: Vec<Fetch>) {
        let Some(tx) = self.event_tx.clone() else {
            warn!(count = fetches.len(), "event loop not running; dropping fetches");
            return;
        };
        for fetch in fetches {
            let client = self.client.clone();
            let tx = tx.clone();
            spawn(async move {
                let fetched = execute_fetch(&client, fetch).await;
                deliver(&tx, AppEvent::Fetched(fetched), "fetch").await;
            });
        }
    }

    fn spawn_session_refresh(&self) {
        let session = self.session.clone();
        spawn(async move {
            session.refresh().await;
        });
    }

    fn spawn_auth(&self, action: &'static str, credentials: Option<(String, String)>) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        let client = self.client.clone();
        let session = self.session.clone();
        spawn(async move {
            let result = match credentials {
                Some((name, token)) => client.login_by_access_token(&name, &token).await,
                None => client.logout().await,
            };
            session.refresh().await;
            deliver(&tx, AppEvent::AuthFinished { action, result }, action).await;
        });
    }

    fn navigate(&mut self, route: Route) {
        let fetches = self.browser.navigate(route);
        self.after_route_change();
        self.dispatch(fetches);
    }

    fn after_route_change(&mut self) {
        self.state.cursor = 0;
        self.state.offset = 0;
        self.state.home_focus = HomeFocus::Groups;
        self.state.set_status(format!("{}", self.browser.route()));
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.notice.is_some() {
            self.notice = None;
            return;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return;
        }
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.state.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.move_cursor(1, self.selectable_len()),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_cursor(-1, self.selectable_len()),
            KeyCode::Char('g') | KeyCode::Home => self.state.move_to(0, self.selectable_len()),
            KeyCode::Char('G') | KeyCode::End => {
                let len = self.selectable_len();
                self.state.move_to(len.saturating_sub(1), len);
            }
            KeyCode::Tab if *self.browser.route() == Route::Home => self.toggle_home_focus(),
            KeyCode::Enter => self.activate_selection(),
            KeyCode::Esc | KeyCode::Backspace => {
                let fetches = self.browser.back();
                self.after_route_change();
                self.dispatch(fetches);
            }
            KeyCode::Char('/') => {
                self.prompt = Some(PromptModal::search(&self.browser.search.query));
            }
            KeyCode::Char('h') => self.navigate(Route::Home),
            KeyCode::Char('p') => self.navigate(Route::Profile),
            KeyCode::Char('r') => {
                let fetches = self.browser.reload();
                self.state.set_status("Reloading".to_string());
                self.dispatch(fetches);
            }
            KeyCode::Char('l') => self.prompt = Some(PromptModal::login()),
            KeyCode::Char('o') => {
                self.notice = Some(oauth_notice(self.client.oauth_login_url().as_str()));
            }
            KeyCode::Char('L') => {
                self.state.set_status("Logging out".to_string());
                self.spawn_auth("Logout", None);
            }
            KeyCode::Char('c') => match self.browser.create_token() {
                Some(fetch) => {
                    self.state.set_status("Creating access token".to_string());
                    self.dispatch(vec![fetch]);
                }
                None => self.state.set_status("Log in to create tokens".to_string()),
            },
            KeyCode::Char('d') => self.delete_selected_token(),
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        let mut submit = false;
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                return;
            }
            KeyCode::Enter | KeyCode::Tab => {
                if !prompt.advance() && key.code == KeyCode::Enter {
                    submit = true;
                }
            }
            KeyCode::BackTab | KeyCode::Up => prompt.retreat(),
            KeyCode::Down => {
                prompt.advance();
            }
            KeyCode::Left => prompt.focused().move_cursor(-1),
            KeyCode::Right => prompt.focused().move_cursor(1),
            KeyCode::Home => prompt.focused().move_home(),
            KeyCode::End => prompt.focused().move_end(),
            KeyCode::Backspace => prompt.focused().backspace(),
            KeyCode::Delete => prompt.focused().delete(),
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    prompt.focused().insert(ch);
                }
            }
            _ => {}
        }

        if !submit {
            return;
        }
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let mut values = prompt.values().into_iter();
        match prompt.kind {
            PromptKind::Search => {
                let query = values.next().unwrap_or_default();
                self.navigate(Route::search(query));
            }
            PromptKind::Login => {
                let name = values.next().unwrap_or_default();
                let token = values.next().unwrap_or_default();
                if name.is_empty() || token.is_empty() {
                    self.state
                        .set_status("Both GitHub name and access token are required".to_string());
                    return;
                }
                self.state.set_status(format!("Logging in as {name}"));
                self.spawn_auth("Login", Some((name, token)));
            }
        }
    }

    fn toggle_home_focus(&mut self) {
        self.state.home_focus = match self.state.home_focus {
            HomeFocus::Groups => HomeFocus::Packages,
            HomeFocus::Packages => HomeFocus::Groups,
        };
        self.state.cursor = 0;
        self.state.offset = 0;
    }

    /// Number of rows the cursor can move over on the current page.
    pub(crate) fn selectable_len(&self) -> usize {
        let len = |list: Option<usize>| list.unwrap_or(0);
        match self.browser.route() {
            Route::Home => match self.state.home_focus {
                HomeFocus::Groups => len(self.browser.home.groups.ready().map(Vec::len)),
                HomeFocus::Packages => len(self.browser.home.group_packages.ready().map(Vec::len)),
            },
            Route::Search { .. } => len(self.browser.search.results.ready().map(Vec::len)),
            Route::Package { .. } => len(self.browser.package.versions.ready().map(Vec::len)),
            Route::Profile => len(self.browser.profile.tokens.tokens().ready().map(Vec::len)),
        }
    }

    fn activate_selection(&mut self) {
        let cursor = self.state.cursor;
        match self.browser.route().clone() {
            Route::Home => match self.state.home_focus {
                HomeFocus::Groups => {
                    let group = self
                        .browser
                        .home
                        .groups
                        .ready()
                        .and_then(|groups| groups.get(cursor).cloned());
                    if let Some(group) = group {
                        let fetches = self.browser.select_group(group);
                        self.toggle_home_focus();
                        self.dispatch(fetches);
                    }
                }
                HomeFocus::Packages => {
                    let package = self
                        .browser
                        .home
                        .group_packages
                        .ready()
                        .and_then(|packages| packages.get(cursor).cloned());
                    if let Some(package) = package {
                        self.navigate(Route::package(package));
                    }
                }
            },
            Route::Search { .. } => {
                let package = self
                    .browser
                    .search
                    .results
                    .ready()
                    .and_then(|results| results.get(cursor).cloned());
                if let Some(package) = package {
                    self.navigate(Route::package(package));
                }
            }
            Route::Package { .. } => {
                let version = self
                    .browser
                    .package
                    .versions
                    .ready()
                    .and_then(|versions| versions.get(cursor).cloned());
                if let Some(version) = version {
                    self.navigate(Route::version(&version));
                }
            }
            Route::Profile => {}
        }
    }

    fn delete_selected_token(&mut self) {
        if *self.browser.route() != Route::Profile {
            return;
        }
        let token_id = self
            .browser
            .profile
            .tokens
            .tokens()
            .ready()
            .and_then(|tokens| tokens.get(self.state.cursor))
            .map(|token| token.id);
        let Some(token_id) = token_id else {
            return;
        };
        if let Some(fetch) = self.browser.delete_token(token_id) {
            self.state.set_status(format!("Deleting token {token_id}"));
            self.dispatch(vec![fetch]);
        }
    }
}

/// Instructions for the browser-only OAuth flow.
///
/// The session cookie set by that flow stays in the external browser, so
/// the terminal client points at `l` for logging in here.
fn oauth_notice(url: &str) -> Notice {
    Notice {
        title: "Login with GitHub",
        lines: vec![
            "GitHub OAuth completes in your web browser:".to_string(),
            String::new(),
            url.to_string(),
            String::new(),
            "To log in this terminal, press l and enter a GitHub access token.".to_string(),
        ],
    }
}

/// Hand `event` to the loop. Returns false once the loop has shut down.
async fn deliver(tx: &mpsc::Sender<AppEvent>, event: AppEvent, what: &str) -> bool {
    if tx.send(event).await.is_err() {
        debug!("event loop closed before {what} completed");
        return false;
    }
    true
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

pub(crate) struct UiState {
    pub cursor: usize,
    pub offset: usize,
    pub list_height: usize,
    pub status: String,
    pub home_focus: HomeFocus,
    pub tick: usize,
    pub should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            cursor: 0,
            offset: 0,
            list_height: 1,
            status: "Ready".to_string(),
            home_focus: HomeFocus::Groups,
            tick: 0,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn move_cursor(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        let idx = (self.cursor as isize + delta).clamp(0, len as isize - 1);
        self.cursor = idx as usize;
        self.ensure_cursor_visible(len);
    }

    fn move_to(&mut self, index: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.cursor = index.min(len - 1);
        self.ensure_cursor_visible(len);
    }

    pub fn clamp_cursor(&mut self, len: usize) {
        if len == 0 {
            self.cursor = 0;
            self.offset = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    pub fn ensure_cursor_visible(&mut self, len: usize) {
        if len == 0 || self.list_height == 0 {
            self.offset = 0;
            return;
        }
        let height = self.list_height;
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }
        self.offset = self.offset.min(len.saturating_sub(height));
    }

    /// Spinner frame for loading indicators.
    pub fn spinner(&self) -> char {
        const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
        FRAMES[self.tick % FRAMES.len()]
    }
}
