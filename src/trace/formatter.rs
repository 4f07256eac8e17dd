//! Bounded content formatters.
//!
//! A formatter accumulates at most one line's worth of content units and
//! renders them into a single trace line when the window is full, or when
//! a partial flush is forced at close. Byte content renders as a hex/ASCII
//! dump, character content as an escaped transcript.
//!
//! Formatters are pure: they hand rendered lines back to the caller instead
//! of writing them. The owning record serializes access to each formatter
//! and writes the returned lines while still holding that lock, which keeps
//! per-direction lines in append order.

use std::fmt::{self, Write as _};

/// Bytes rendered per dump line.
pub const BYTES_PER_LINE: usize = 16;

/// Characters rendered per transcript line.
pub const CHARS_PER_LINE: usize = 128;

/// Width of a full hex column: three columns per byte plus the midpoint gap.
const HEX_FIELD_WIDTH: usize = BYTES_PER_LINE * 3 + 1;

/// Which side of the exchange a piece of content belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Request => "Request",
            Direction::Response => "Response",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of traced content: `u8` for byte mode, `char` for character mode.
pub trait ContentUnit: Copy + Send + 'static {
    /// Units buffered before a full flush.
    const CAPACITY: usize;
    /// Mode name used in the banner line.
    const MODE: &'static str;
    /// Plural unit name used in the close summary.
    const UNIT_NAME: &'static str;

    /// Render buffered units as one content line.
    fn render(direction: Direction, units: &[Self]) -> String;
}

impl ContentUnit for u8 {
    const CAPACITY: usize = BYTES_PER_LINE;
    const MODE: &'static str = "Byte Content";
    const UNIT_NAME: &'static str = "bytes";

    fn render(direction: Direction, units: &[u8]) -> String {
        let mut hex = String::with_capacity(HEX_FIELD_WIDTH);
        let mut ascii = String::with_capacity(units.len());
        for (i, &b) in units.iter().enumerate() {
            if i == BYTES_PER_LINE / 2 {
                hex.push(' ');
            }
            let _ = write!(hex, "{:02X} ", b);
            // only simple printable characters
            ascii.push(if (0x20..=0x7E).contains(&b) { b as char } else { '.' });
        }
        format!(
            "[{}] Content:: {:<width$} | {}",
            direction,
            hex,
            ascii,
            width = HEX_FIELD_WIDTH
        )
    }
}

impl ContentUnit for char {
    const CAPACITY: usize = CHARS_PER_LINE;
    const MODE: &'static str = "Character Based";
    const UNIT_NAME: &'static str = "characters";

    fn render(direction: Direction, units: &[char]) -> String {
        let mut line = format!("[{}] Content:: ", direction);
        line.reserve(units.len());
        for &c in units {
            match c {
                '\r' => line.push_str("\\r"),
                '\n' => line.push_str("\\n"),
                '\t' => line.push_str("\\t"),
                _ => line.push(c),
            }
        }
        line
    }
}

/// Fixed-window accumulator for one direction and one content mode.
#[derive(Debug)]
pub struct ContentFormatter<U> {
    direction: Direction,
    buf: Vec<U>,
    total: u64,
    closed: bool,
}

impl<U: ContentUnit> ContentFormatter<U> {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            buf: Vec::with_capacity(U::CAPACITY),
            total: 0,
            closed: false,
        }
    }

    /// Line announcing the direction and mode. Emitted once, at creation.
    pub fn banner(&self) -> String {
        format!("[{}] {}", self.direction, U::MODE)
    }

    /// Buffer one unit. A full window is flushed *before* the unit is stored,
    /// and the rendered line is returned for the caller to write.
    ///
    /// Units offered after `close` are dropped.
    pub fn append(&mut self, unit: U) -> Option<String> {
        if self.closed {
            return None;
        }
        self.total += 1;
        let line = if self.buf.len() >= U::CAPACITY {
            Some(self.flush())
        } else {
            None
        };
        self.buf.push(unit);
        line
    }

    /// Render whatever is buffered (possibly nothing) and clear the window.
    pub fn flush(&mut self) -> String {
        let line = U::render(self.direction, &self.buf);
        self.buf.clear();
        line
    }

    /// Final partial flush plus the unit-count summary. `None` once closed.
    pub fn close(&mut self) -> Option<[String; 2]> {
        if self.closed {
            return None;
        }
        self.closed = true;
        let last = self.flush();
        let summary = format!(
            "[{}] Closed :: Seen {} {}",
            self.direction,
            group_thousands(self.total),
            U::UNIT_NAME
        );
        Some([last, summary])
    }

    /// Units observed so far, including buffered ones.
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Format a count with `,` grouping separators.
pub(crate) fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
