const MAX_INPUT_LEN: usize = 128;

/// Single-line text field.
#[derive(Debug, Clone)]
pub struct TextInput {
    pub label: &'static str,
    input: String,
    cursor: usize,
    masked: bool,
}

impl TextInput {
    pub fn new(label: &'static str, initial: &str) -> Self {
        Self {
            label,
            input: initial.to_string(),
            cursor: initial.len(),
            masked: false,
        }
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.input.len() as isize;
        self.cursor = (self.cursor as isize + delta).clamp(0, len) as usize;
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    pub fn insert(&mut self, ch: char) {
        if self.input.len() >= MAX_INPUT_LEN {
            return;
        }
        // Byte offsets double as char offsets only for ASCII.
        if ch.is_ascii() && !ch.is_ascii_control() {
            self.input.insert(self.cursor, ch);
            self.cursor += 1;
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 && self.cursor <= self.input.len() {
            self.cursor -= 1;
            self.input.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.len() {
            self.input.remove(self.cursor);
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Text as drawn on screen.
    pub fn display(&self) -> String {
        if self.masked {
            "•".repeat(self.input.len())
        } else {
            self.input.clone()
        }
    }

    pub fn value(&self) -> String {
        self.input.trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Search,
    Login,
}

/// Modal with one or more fields, submitted with Enter on the last one.
#[derive(Debug, Clone)]
pub struct PromptModal {
    pub kind: PromptKind,
    pub fields: Vec<TextInput>,
    pub focus: usize,
}

impl PromptModal {
    pub fn search(query: &str) -> Self {
        Self {
            kind: PromptKind::Search,
            fields: vec![TextInput::new("Search packages", query)],
            focus: 0,
        }
    }

    pub fn login() -> Self {
        Self {
            kind: PromptKind::Login,
            fields: vec![
                TextInput::new("GitHub name", ""),
                TextInput::new("GitHub access token", "").masked(),
            ],
            focus: 0,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            PromptKind::Search => "Search",
            PromptKind::Login => "Login with GitHub access token",
        }
    }

    pub fn focused(&mut self) -> &mut TextInput {
        let index = self.focus.min(self.fields.len().saturating_sub(1));
        &mut self.fields[index]
    }

    /// Move focus forward; `false` when already on the last field.
    pub fn advance(&mut self) -> bool {
        if self.focus + 1 < self.fields.len() {
            self.focus += 1;
            true
        } else {
            false
        }
    }

    pub fn retreat(&mut self) {
        self.focus = self.focus.saturating_sub(1);
    }

    pub fn values(&self) -> Vec<String> {
        self.fields.iter().map(TextInput::value).collect()
    }
}
