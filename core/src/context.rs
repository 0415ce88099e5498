//! Display read model for front-ends.
//!
//! The `ImeContext` struct is a simple data container with public fields. After
//! every key the engine refreshes it from the session; renderers read the
//! fields and never talk to the session directly.

use crate::candidate::PAGE_SIZE;
use crate::keymap::InputScheme;
use crate::session::{Phase, Session};

/// What the nine digit cells show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GridHint {
    /// Stroke legend for the first digit
    #[default]
    Default,
    /// Second-level stroke legend after typing `digit`
    Stroke(u8),
    /// Two digits typed; the legend is dimmed until the third
    Dimmed,
    /// Candidate text in `slots`
    Candidates,
    /// Related characters of the last emission, shown greyed in `slots`
    RelatePreview,
}

/// Read model for renderers.
#[derive(Debug, Clone, Default)]
pub struct ImeContext {
    /// Nine cells in key order (slot 0 is key 1)
    pub slots: Vec<String>,

    /// What `slots` represent
    pub grid: GridHint,

    /// Label of the zero key (`下頁`, `標點`, `姓氏`, `選字` or empty)
    pub zero_label: String,

    /// Describes the current entry (`同音[木]`, `速選`, typed code ...)
    pub status_prefix: String,

    /// Last message (`已輸出: 木`, prompts, mode summary)
    pub status_text: String,

    /// `2/3頁` while a candidate set spans several pages
    pub page_indicator: String,

    pub homo: bool,
    pub open_close: bool,
    pub simplified_output: bool,
    pub scheme: InputScheme,
    pub global_input: bool,
    pub visible: bool,
}

/// Label of the cancel key.
pub const CANCEL_LABEL: &str = "取消";

impl ImeContext {
    pub fn new() -> Self {
        Self {
            slots: vec![String::new(); PAGE_SIZE],
            visible: true,
            ..Self::default()
        }
    }

    /// Refresh every session-derived field. `status_text`, `global_input` and
    /// `visible` belong to the engine and are left alone.
    pub fn sync_from(&mut self, session: &Session) {
        let candidates = session.candidates();
        let code = session.code();

        self.grid = match session.phase() {
            Phase::Selecting => GridHint::Candidates,
            Phase::RelatePreview => GridHint::RelatePreview,
            Phase::Composing if code.len() == 1 => {
                GridHint::Stroke(code.as_bytes()[0].saturating_sub(b'0'))
            }
            Phase::Composing => GridHint::Dimmed,
            Phase::Idle => GridHint::Default,
        };

        self.slots = match self.grid {
            GridHint::Candidates => candidates.page_slots(),
            GridHint::RelatePreview => {
                let mut slots: Vec<String> =
                    session.relate_preview().iter().take(PAGE_SIZE).cloned().collect();
                slots.resize(PAGE_SIZE, String::new());
                slots
            }
            _ => vec![String::new(); PAGE_SIZE],
        };

        self.zero_label = match self.grid {
            GridHint::Candidates if candidates.is_paged() => "下頁",
            GridHint::Candidates => "",
            GridHint::Default | GridHint::RelatePreview => "標點",
            GridHint::Stroke(_) => "姓氏",
            GridHint::Dimmed => "選字",
        }
        .to_string();

        self.page_indicator = candidates.page_label().unwrap_or_default();
        self.status_prefix = session.status_prefix().to_string();
        self.homo = session.homo();
        self.open_close = session.open_close();
        self.simplified_output = session.simplified_output();
        self.scheme = session.scheme();
    }

    /// Window title line: `九万 [同音] [簡] <prefix> <status>`.
    pub fn title(&self) -> String {
        let mut title = String::from("九万 ");
        if self.homo {
            title.push_str("[同音] ");
        }
        if self.simplified_output {
            title.push_str("[簡] ");
        }
        title.push_str(&self.status_prefix);
        title.push(' ');
        if self.page_indicator.is_empty() {
            title.push_str(&self.status_text);
        } else {
            title.push_str(&self.page_indicator);
        }
        title
    }

    /// Summary of the mode toggles shown after each toggle.
    pub fn mode_summary(&self) -> String {
        format!(
            "輸入:{}({}) 輸出:{} F10:隱藏",
            match self.scheme {
                InputScheme::Numpad => "數字鍵盤",
                InputScheme::Letters => "字母鍵盤",
            },
            if self.global_input { "全域" } else { "聚焦" },
            if self.simplified_output { "簡體" } else { "繁體" },
        )
    }

    /// True when the grid shows anything besides the stroke legend.
    pub fn has_visible_state(&self) -> bool {
        self.grid != GridHint::Default || !self.status_prefix.is_empty()
    }
}
