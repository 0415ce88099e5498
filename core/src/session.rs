//! Input state machine.
//!
//! `Session` is a plain state record. `Session::apply` is the only transition:
//! it takes a `Command`, may query a `Lookup`, and returns the next state plus
//! the `Effect` the caller has to perform. Nothing outside the returned value
//! is touched, so the same state, command and dataset always give the same
//! result.
//!
//! Phases:
//! - Idle: no code, no candidates (optionally showing a relate preview)
//! - Composing: one or two digits typed
//! - Selecting: a candidate set is on screen and digits pick from it
//!
//! A third digit, or a `0` at any point, resolves the typed code.

use tracing::{debug, error, warn};

use crate::candidate::CandidateList;
use crate::keymap::{Command, InputScheme};
use crate::lookup::{Lookup, PUNCTUATION_PAIR_CODE, QUICK_PICK_BASE};
use crate::utils::{char_len, split_chars};

/// Maximum number of digits in a code.
pub const MAX_CODE_LEN: usize = 3;

/// Prompt shown when relate is requested before any character was emitted.
pub const RELATE_PROMPT: &str = "請先輸入一個字";

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Send `text` to the focused application; `cursor_back` moves the caret
    /// one position left afterwards (between a punctuation pair).
    Emit { text: String, cursor_back: bool },
    /// Show a message in the status line.
    Status(String),
    ToggleVisibility,
}

/// Coarse phase derived from the state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RelatePreview,
    Composing,
    Selecting,
}

/// Complete state of one input session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Digits typed so far (at most three)
    code: String,

    /// Digits pick from `candidates` instead of extending `code`
    select_mode: bool,

    /// Current candidate set and page
    candidates: CandidateList,

    /// Next pick expands to homophones
    homo: bool,

    /// Next pick is emitted as a punctuation pair
    open_close: bool,

    /// Last emitted single character, source of relate lookups
    last_word: String,

    /// Describes the current candidate set (`同音[木]`, `[木]關聯`, ...)
    status_prefix: String,

    /// Related characters shown after an emission
    relate_preview: Vec<String>,

    simplified_output: bool,
    scheme: InputScheme,
}

impl Session {
    pub fn new(scheme: InputScheme, simplified_output: bool) -> Self {
        Self {
            scheme,
            simplified_output,
            ..Self::default()
        }
    }

    // ========== Read access ==========

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_selecting(&self) -> bool {
        self.select_mode
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn homo(&self) -> bool {
        self.homo
    }

    pub fn open_close(&self) -> bool {
        self.open_close
    }

    pub fn last_word(&self) -> &str {
        &self.last_word
    }

    pub fn status_prefix(&self) -> &str {
        &self.status_prefix
    }

    pub fn relate_preview(&self) -> &[String] {
        &self.relate_preview
    }

    pub fn simplified_output(&self) -> bool {
        self.simplified_output
    }

    pub fn scheme(&self) -> InputScheme {
        self.scheme
    }

    pub fn phase(&self) -> Phase {
        if self.select_mode {
            Phase::Selecting
        } else if !self.code.is_empty() {
            Phase::Composing
        } else if !self.relate_preview.is_empty() {
            Phase::RelatePreview
        } else {
            Phase::Idle
        }
    }

    // ========== Mode toggles (persist across cancel) ==========

    pub fn set_simplified_output(&mut self, enabled: bool) {
        self.simplified_output = enabled;
    }

    pub fn set_scheme(&mut self, scheme: InputScheme) {
        self.scheme = scheme;
    }

    // ========== Transitions ==========

    /// Apply one command and return the next state with its effect.
    pub fn apply(&self, command: Command, lookup: &dyn Lookup) -> (Session, Effect) {
        let mut next = self.clone();
        let effect = next.step(command, lookup);
        debug!(?command, phase = ?next.phase(), ?effect, "session step");
        (next, effect)
    }

    fn step(&mut self, command: Command, lookup: &dyn Lookup) -> Effect {
        match command {
            Command::Digit(d) if d <= 9 => self.press_digit(d, lookup),
            Command::Digit(d) => {
                warn!(digit = d, "ignoring out-of-range digit");
                Effect::None
            }
            Command::Cancel => {
                self.cancel_to_idle();
                Effect::None
            }
            Command::Relate => self.relate(lookup),
            Command::Homophone => self.homophone(lookup),
            Command::OpenClose => self.start_open_close(lookup),
            Command::PrevOrShortcut => {
                if self.select_mode {
                    self.candidates.prev_page();
                    Effect::None
                } else {
                    self.shortcut(lookup)
                }
            }
            Command::Next => {
                if self.select_mode {
                    self.candidates.next_page();
                }
                Effect::None
            }
            Command::ToggleVisibility => Effect::ToggleVisibility,
        }
    }

    fn press_digit(&mut self, digit: u8, lookup: &dyn Lookup) -> Effect {
        if self.select_mode {
            if digit == 0 {
                self.candidates.next_page();
                return Effect::None;
            }
            return self.select(digit, lookup);
        }

        self.relate_preview.clear();
        self.code.push(char::from(b'0' + digit));
        self.status_prefix = self.code.clone();
        if digit == 0 || self.code.len() >= MAX_CODE_LEN {
            self.resolve_code(lookup);
        }
        Effect::None
    }

    /// Look up the typed code and enter selection, or go idle on a miss.
    fn resolve_code(&mut self, lookup: &dyn Lookup) {
        let results = code_candidates(&self.code, lookup);
        if results.is_empty() {
            debug!(code = %self.code, "code resolved to nothing");
            self.cancel_to_idle();
            return;
        }
        if self.homo {
            self.status_prefix = format!("同音選字[{}]", self.code);
        }
        self.start_select(results);
    }

    /// Enter selection on `words`. An empty set leaves the state alone.
    fn start_select(&mut self, words: Vec<String>) {
        if words.is_empty() {
            return;
        }
        self.candidates = CandidateList::from_candidates(words);
        self.select_mode = true;
        self.code.clear();
        self.relate_preview.clear();
    }

    fn select(&mut self, slot: u8, lookup: &dyn Lookup) -> Effect {
        let Some(pick) = self.candidates.pick(slot).map(str::to_string) else {
            return Effect::None;
        };

        if self.homo {
            self.homo = false;
            let homophones = lookup.homophones_for(&pick);
            if !homophones.is_empty() {
                self.status_prefix = format!("同音[{pick}]");
                self.start_select(homophones);
                return Effect::None;
            }
            debug!(%pick, "no homophones, emitting the pick itself");
        }

        if self.open_close {
            self.cancel_to_idle();
            return Effect::Emit {
                text: pick,
                cursor_back: true,
            };
        }

        if char_len(&pick) == 1 {
            self.last_word = pick.clone();
            let related = lookup.related_for(&pick);
            if related.is_empty() {
                self.cancel_to_idle();
            } else {
                self.relate_preview = related;
                self.cancel_preserving_relate();
            }
        } else {
            self.last_word.clear();
            self.cancel_to_idle();
        }
        Effect::Emit {
            text: pick,
            cursor_back: false,
        }
    }

    fn homophone(&mut self, lookup: &dyn Lookup) -> Effect {
        if !self.select_mode && !self.code.is_empty() {
            let results = code_candidates(&self.code, lookup);
            if !results.is_empty() {
                self.homo = true;
                self.open_close = false;
                self.status_prefix = format!("同音[{}]", self.code);
                self.start_select(results);
            }
            return Effect::None;
        }

        self.homo = !self.homo;
        if self.homo {
            self.open_close = false;
        }
        Effect::None
    }

    fn start_open_close(&mut self, lookup: &dyn Lookup) -> Effect {
        self.homo = false;
        let source = lookup.candidates_for_code(PUNCTUATION_PAIR_CODE).concat();
        let pairs = pair_up(&source);
        if pairs.is_empty() {
            warn!("no punctuation pairs in the dataset");
            return Effect::None;
        }
        self.open_close = true;
        self.status_prefix = "「」".to_string();
        self.start_select(pairs);
        Effect::None
    }

    fn relate(&mut self, lookup: &dyn Lookup) -> Effect {
        if self.select_mode {
            return Effect::None;
        }
        if char_len(&self.last_word) != 1 {
            return Effect::Status(RELATE_PROMPT.to_string());
        }
        let related = lookup.related_for(&self.last_word);
        if related.is_empty() {
            return Effect::Status(format!("[{}]沒有關聯字", self.last_word));
        }
        self.homo = false;
        self.status_prefix = format!("[{}]關聯", self.last_word);
        self.start_select(related);
        Effect::None
    }

    fn shortcut(&mut self, lookup: &dyn Lookup) -> Effect {
        let (code, prefix) = match self.code.len() {
            0 => (QUICK_PICK_BASE, "速選".to_string()),
            1 => {
                let digit: u32 = self.code.parse().unwrap_or(0);
                (QUICK_PICK_BASE + digit, format!("速選{}", self.code))
            }
            _ => return Effect::None,
        };
        let results = lookup.candidates_for_code(code);
        if results.is_empty() {
            self.cancel_to_idle();
            return Effect::None;
        }
        self.status_prefix = prefix;
        self.start_select(results);
        Effect::None
    }

    /// Drop everything belonging to the current entry, including the relate
    /// preview. `last_word` and the mode toggles survive.
    pub fn cancel_to_idle(&mut self) {
        self.relate_preview.clear();
        self.cancel_preserving_relate();
    }

    /// Drop the code, candidates and pending flags but keep the relate
    /// preview on screen.
    pub fn cancel_preserving_relate(&mut self) {
        self.code.clear();
        self.select_mode = false;
        self.candidates.clear();
        self.homo = false;
        self.open_close = false;
        self.status_prefix.clear();
    }
}

/// Candidates for a typed code. A code that is not a number resolves to
/// nothing.
fn code_candidates(code: &str, lookup: &dyn Lookup) -> Vec<String> {
    match code.parse::<u32>() {
        Ok(n) => lookup.candidates_for_code(n),
        Err(_) => Vec::new(),
    }
}

/// Split the joined punctuation string into two-character pairs.
fn pair_up(source: &str) -> Vec<String> {
    let chars = split_chars(source);
    if chars.len() % 2 != 0 {
        error!(
            len = chars.len(),
            "punctuation pair source has odd length, dropping the last character"
        );
    }
    chars.chunks_exact(2).map(|pair| pair.concat()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::TableLookup;
    use pretty_assertions::assert_eq;

    fn table() -> TableLookup {
        let mut t = TableLookup::new();
        t.insert_code(111, "一二三");
        t.insert_code(120, "木水火");
        t.insert_code(0, "，。？");
        t.insert_code(222, "林*森");
        t.insert_code(333, "中文");
        t.insert_code(PUNCTUATION_PAIR_CODE, "「」()《》");
        t.insert_code(QUICK_PICK_BASE, "的是");
        t.insert_code(QUICK_PICK_BASE + 4, "我你");
        t.insert_related("木", "林 森");
        t.insert_reading("木", "mu", "4");
        t.insert_reading("目", "mu", "4");
        t.insert_reading("母", "mu", "3");
        t
    }

    fn run(session: &Session, commands: &[Command], lookup: &dyn Lookup) -> (Session, Vec<Effect>) {
        let mut state = session.clone();
        let mut effects = Vec::new();
        for &c in commands {
            let (next, effect) = state.apply(c, lookup);
            state = next;
            effects.push(effect);
        }
        (state, effects)
    }

    fn digits(s: &str) -> Vec<Command> {
        s.bytes().map(|b| Command::Digit(b - b'0')).collect()
    }

    #[test]
    fn two_digits_compose_without_lookup() {
        let t = table();
        let (s, _) = run(&Session::default(), &digits("11"), &t);
        assert_eq!(s.phase(), Phase::Composing);
        assert_eq!(s.code(), "11");
        assert_eq!(s.status_prefix(), "11");
    }

    #[test]
    fn third_digit_enters_selection() {
        let t = table();
        let (s, _) = run(&Session::default(), &digits("111"), &t);
        assert!(s.is_selecting());
        assert_eq!(s.code(), "");
        assert_eq!(s.candidates().candidates(), &["一", "二", "三"]);
    }

    #[test]
    fn zero_resolves_immediately() {
        let t = table();
        let (s, _) = run(&Session::default(), &digits("0"), &t);
        assert_eq!(s.candidates().candidates(), &["，", "。", "？"]);
        let (s, _) = run(&Session::default(), &digits("120"), &t);
        assert_eq!(s.candidates().candidates(), &["木", "水", "火"]);
    }

    #[test]
    fn unknown_code_returns_to_idle() {
        let t = table();
        let (s, effects) = run(&Session::default(), &digits("999"), &t);
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.status_prefix(), "");
        assert!(effects.iter().all(|e| *e == Effect::None));
    }

    #[test]
    fn placeholder_slot_is_a_no_op() {
        let t = table();
        let (before, _) = run(&Session::default(), &digits("222"), &t);
        let (after, effect) = before.apply(Command::Digit(2), &t);
        assert_eq!(effect, Effect::None);
        assert_eq!(after, before);
    }

    #[test]
    fn single_character_pick_sets_last_word() {
        let t = table();
        let (s, effects) = run(&Session::default(), &digits("1201"), &t);
        assert_eq!(effects[3], Effect::Emit { text: "木".into(), cursor_back: false });
        assert_eq!(s.last_word(), "木");
        assert_eq!(s.relate_preview(), &["林", "森"]);
    }

    #[test]
    fn multi_character_pick_clears_last_word() {
        let mut t = table();
        t.insert_related("木", "林 森林");
        let (s, _) = run(&Session::default(), &[digits("1201"), vec![Command::Relate]].concat(), &t);
        assert_eq!(s.status_prefix(), "[木]關聯");
        let (s, effect) = s.apply(Command::Digit(2), &t);
        assert_eq!(effect, Effect::Emit { text: "森林".into(), cursor_back: false });
        assert_eq!(s.last_word(), "");
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn open_close_pairs_and_moves_cursor_back() {
        let t = table();
        let (s, _) = run(&Session::default(), &[Command::OpenClose], &t);
        assert!(s.open_close());
        assert_eq!(s.status_prefix(), "「」");
        assert_eq!(s.candidates().candidates(), &["「」", "()", "《》"]);
        let (s, effect) = s.apply(Command::Digit(3), &t);
        assert_eq!(effect, Effect::Emit { text: "《》".into(), cursor_back: true });
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.open_close());
        assert_eq!(s.last_word(), "");
    }

    #[test]
    fn odd_punctuation_source_drops_trailing_character() {
        assert_eq!(pair_up("「」『"), vec!["「」"]);
        assert!(pair_up("").is_empty());
    }

    #[test]
    fn open_close_clears_homophone_flag() {
        let t = table();
        let (s, _) = run(&Session::default(), &[Command::Homophone, Command::OpenClose], &t);
        assert!(!s.homo());
        assert!(s.open_close());
    }

    #[test]
    fn homophone_on_code_enters_selection_with_flag() {
        let t = table();
        let (s, _) = run(&Session::default(), &[digits("12"), vec![Command::Homophone]].concat(), &t);
        // "12" is not a stored code
        assert_eq!(s.phase(), Phase::Composing);
        assert!(!s.homo());

        let mut t = table();
        t.insert_code(12, "木目");
        let (s, _) = run(&Session::default(), &[digits("12"), vec![Command::Homophone]].concat(), &t);
        assert!(s.is_selecting());
        assert!(s.homo());
        assert_eq!(s.status_prefix(), "同音[12]");
    }

    #[test]
    fn sticky_homophone_marks_next_resolution() {
        let t = table();
        let (s, _) = run(&Session::default(), &[vec![Command::Homophone], digits("120")].concat(), &t);
        assert!(s.homo());
        assert_eq!(s.status_prefix(), "同音選字[120]");
        let (s, effect) = s.apply(Command::Digit(1), &t);
        assert_eq!(effect, Effect::None);
        assert_eq!(s.candidates().candidates(), &["木", "目", "母"]);
        assert_eq!(s.status_prefix(), "同音[木]");
        assert!(!s.homo());
    }

    #[test]
    fn homophone_toggles_while_selecting() {
        let t = table();
        let (s, _) = run(&Session::default(), &digits("111"), &t);
        let (s, _) = s.apply(Command::Homophone, &t);
        assert!(s.homo());
        let (s, _) = s.apply(Command::Homophone, &t);
        assert!(!s.homo());
        assert_eq!(s.candidates().candidates(), &["一", "二", "三"]);
    }

    #[test]
    fn empty_homophone_expansion_emits_the_pick() {
        let t = table();
        let (s, _) = run(&Session::default(), &[vec![Command::Homophone], digits("111")].concat(), &t);
        let (s, effect) = s.apply(Command::Digit(2), &t);
        assert_eq!(effect, Effect::Emit { text: "二".into(), cursor_back: false });
        assert!(!s.homo());
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn relate_without_last_word_prompts() {
        let t = table();
        let (s, effect) = Session::default().apply(Command::Relate, &t);
        assert_eq!(effect, Effect::Status(RELATE_PROMPT.to_string()));
        assert_eq!(s, Session::default());
    }

    #[test]
    fn shortcut_uses_quick_pick_codes() {
        let t = table();
        let (s, _) = Session::default().apply(Command::PrevOrShortcut, &t);
        assert_eq!(s.status_prefix(), "速選");
        assert_eq!(s.candidates().candidates(), &["的", "是"]);

        let (s, _) = run(&Session::default(), &[Command::Digit(4), Command::PrevOrShortcut], &t);
        assert_eq!(s.status_prefix(), "速選4");
        assert_eq!(s.candidates().candidates(), &["我", "你"]);

        let (s, _) = run(&Session::default(), &[Command::Digit(5), Command::PrevOrShortcut], &t);
        assert_eq!(s.phase(), Phase::Idle);

        let (s, _) = run(&Session::default(), &[digits("11"), vec![Command::PrevOrShortcut]].concat(), &t);
        assert_eq!(s.code(), "11");
    }

    #[test]
    fn cancel_keeps_modes_and_last_word() {
        let t = table();
        let start = Session::new(InputScheme::Letters, true);
        let (s, _) = run(&start, &[digits("1201"), digits("12"), vec![Command::Cancel]].concat(), &t);
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.last_word(), "木");
        assert!(s.simplified_output());
        assert_eq!(s.scheme(), InputScheme::Letters);
    }

    #[test]
    fn typing_clears_relate_preview() {
        let t = table();
        let (s, _) = run(&Session::default(), &digits("1201"), &t);
        assert_eq!(s.phase(), Phase::RelatePreview);
        let (s, _) = s.apply(Command::Digit(1), &t);
        assert!(s.relate_preview().is_empty());
        assert_eq!(s.code(), "1");
    }

    #[test]
    fn toggle_visibility_only_reports_effect() {
        let t = table();
        let (s, _) = run(&Session::default(), &digits("11"), &t);
        let (after, effect) = s.apply(Command::ToggleVisibility, &t);
        assert_eq!(effect, Effect::ToggleVisibility);
        assert_eq!(after, s);
    }
}
