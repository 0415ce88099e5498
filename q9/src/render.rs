//! Terminal rendering of the keypad.
//!
//! The grid follows the numpad layout (7 8 9 / 4 5 6 / 1 2 3) with the zero
//! and cancel keys underneath, below a title line. Redraws only happen when
//! the text changes.

use std::io::Write;

use q9_core::context::CANCEL_LABEL;
use q9_core::{GridHint, ImeContext};

const ROWS: [[usize; 3]; 3] = [[7, 8, 9], [4, 5, 6], [1, 2, 3]];

/// Legend of an empty cell.
fn legend(grid: &GridHint, key: usize) -> String {
    match grid {
        GridHint::Default => format!("({key})"),
        GridHint::Stroke(first) => format!("({first}{key})"),
        GridHint::Dimmed => "·".to_string(),
        GridHint::Candidates | GridHint::RelatePreview => String::new(),
    }
}

fn cell(ctx: &ImeContext, key: usize) -> String {
    let text = ctx.slots.get(key - 1).map(String::as_str).unwrap_or("");
    let shown = match (&ctx.grid, text.is_empty()) {
        (_, true) => legend(&ctx.grid, key),
        (GridHint::RelatePreview, false) => format!("~{text}"),
        (_, false) => text.to_string(),
    };
    format!("{key} {shown}")
}

/// Render the whole keypad, or `None` while hidden.
pub fn render(ctx: &ImeContext) -> Option<String> {
    if !ctx.visible {
        return None;
    }
    let mut out = ctx.title();
    out.push('\n');
    for row in ROWS {
        let cells: Vec<String> = row.iter().map(|&key| cell(ctx, key)).collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    out.push_str(&format!("0 {} | . {}\n", ctx.zero_label, CANCEL_LABEL));
    Some(out)
}

/// Writes the keypad to a terminal stream.
pub struct TerminalRenderer<W: Write> {
    out: W,
    last: Option<Option<String>>,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn draw(&mut self, ctx: &ImeContext) -> std::io::Result<()> {
        let frame = render(ctx);
        if self.last.as_ref() == Some(&frame) {
            return Ok(());
        }
        match &frame {
            Some(text) => write!(self.out, "\n{text}")?,
            None => writeln!(self.out, "\n(hidden, F10 or :v to show)")?,
        }
        self.out.flush()?;
        self.last = Some(frame);
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q9_core::{Command, Session, TableLookup};

    fn ctx_after(digits: &[u8]) -> ImeContext {
        let mut t = TableLookup::new();
        t.insert_code(111, "一二三四五六七八九十");
        let mut session = Session::default();
        for &d in digits {
            session = session.apply(Command::Digit(d), &t).0;
        }
        let mut ctx = ImeContext::new();
        ctx.sync_from(&session);
        ctx
    }

    #[test]
    fn candidates_follow_numpad_layout() {
        let text = render(&ctx_after(&[1, 1, 1])).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("九万 "));
        assert!(lines[0].ends_with("1/2頁"));
        assert_eq!(lines[1], "7 七 | 8 八 | 9 九");
        assert_eq!(lines[3], "1 一 | 2 二 | 3 三");
        assert_eq!(lines[4], format!("0 下頁 | . {CANCEL_LABEL}"));
    }

    #[test]
    fn stroke_legend_after_first_digit() {
        let text = render(&ctx_after(&[4])).unwrap();
        assert!(text.contains("7 (47)"));
        assert!(text.contains("0 姓氏"));
    }

    #[test]
    fn hidden_context_draws_once() {
        let mut ctx = ctx_after(&[]);
        ctx.visible = false;
        assert_eq!(render(&ctx), None);

        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.draw(&ctx).unwrap();
        renderer.draw(&ctx).unwrap();
        let written = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(written.matches("hidden").count(), 1);
    }
}
