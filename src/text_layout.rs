/// Text broken into display rows, plus the (row, column) of every char
/// boundary so the input cursor can be placed and moved between rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedText {
    pub lines: Vec<String>,
    pub positions: Vec<(u16, u16)>,
}

impl WrappedText {
    /// Rows needed to show the text with the cursor at its end.
    pub fn height(&self) -> u16 {
        let cursor_row = self.positions.last().map(|(row, _)| *row).unwrap_or(0);
        (self.lines.len() as u16).max(cursor_row.saturating_add(1))
    }

    pub fn cursor(&self, char_idx: usize) -> (u16, u16) {
        self.positions
            .get(char_idx)
            .or_else(|| self.positions.last())
            .copied()
            .unwrap_or((0, 0))
    }

    /// Char index on `row` closest to `goal_col` without passing it.
    pub fn index_at(&self, row: u16, goal_col: u16) -> Option<usize> {
        let mut first_on_row = None;
        let mut best = None;
        for (idx, (r, c)) in self.positions.iter().copied().enumerate() {
            if r != row {
                continue;
            }
            first_on_row.get_or_insert(idx);
            if c <= goal_col {
                best = Some(idx);
            }
        }
        best.or(first_on_row)
    }
}

struct Wrapper {
    width: usize,
    col: usize,
    lines: Vec<String>,
    positions: Vec<(u16, u16)>,
}

impl Wrapper {
    fn new_row(&mut self) {
        self.lines.push(String::new());
        self.col = 0;
    }

    fn push(&mut self, ch: char) {
        if self.col >= self.width {
            self.new_row();
        }
        if let Some(line) = self.lines.last_mut() {
            line.push(ch);
        }
        self.col += 1;
    }

    fn mark(&mut self) {
        let row = self.lines.len().saturating_sub(1);
        let position = if self.col >= self.width {
            (row + 1, 0)
        } else {
            (row, self.col)
        };
        self.positions.push((position.0 as u16, position.1 as u16));
    }
}

/// Greedy word wrap. Words that fit on a fresh row are moved there whole;
/// longer words are split at the width.
pub fn wrap_text(text: &str, width: u16) -> WrappedText {
    let mut wrapper = Wrapper {
        width: usize::from(width.max(1)),
        col: 0,
        lines: vec![String::new()],
        positions: vec![(0, 0)],
    };

    for (row_idx, raw_row) in text.split('\n').enumerate() {
        if row_idx > 0 {
            wrapper.new_row();
            wrapper.mark();
        }
        for token in tokens(raw_row) {
            let len = token.chars().count();
            let is_word = token.chars().next().is_some_and(|c| !c.is_whitespace());
            if is_word && wrapper.col > 0 && len <= wrapper.width && wrapper.col + len > wrapper.width
            {
                wrapper.new_row();
            }
            for ch in token.chars() {
                wrapper.push(ch);
                wrapper.mark();
            }
        }
    }

    WrappedText {
        lines: wrapper.lines,
        positions: wrapper.positions,
    }
}

/// Splits a row into alternating runs of whitespace and non-whitespace.
fn tokens(row: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (idx, ch) in row.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            out.push(&row[start..idx]);
            start = idx;
        }
        in_space = Some(space);
    }
    if start < row.len() {
        out.push(&row[start..]);
    }
    out
}
