use std::time::{Duration, Instant};

/// Visible columns.
pub const COLS: usize = 16;
/// Visible rows.
pub const ROWS: usize = 2;
/// Row buffer width: text, terminator, 4-byte sentinel.
pub const BUF_COLS: usize = COLS + 1 + 4;

const SENTINEL: u32 = 0xDEAD_BEFF;

/// Character display seam. Rendering details stay behind the trait; the
/// device only prints, overlays and checks buffer integrity.
pub trait Display: Send {
    fn backlight(&self) -> bool;

    fn set_backlight(&mut self, on: bool);

    fn clear(&mut self);

    /// Print at a position; returns false when the text had to be cut or the
    /// position is off screen.
    fn print(&mut self, col: usize, row: usize, text: &str) -> bool;

    /// Print over the regular content until `timeout` elapses.
    fn overlay(&mut self, col: usize, row: usize, text: &str, timeout: Duration) -> bool;

    fn overlay_clear(&mut self);

    /// False once the render buffers are found damaged. Terminal.
    fn check_integrity(&mut self) -> bool;

    /// Push pending changes to the screen; true when something was drawn.
    fn refresh(&mut self) -> bool;
}

type Rows = [[u8; BUF_COLS]; ROWS];

/// In-memory 16×2 character display with guarded row buffers.
///
/// Each row buffer ends in a NUL and a sentinel word. Anything writing past
/// a row damages the sentinel, which [`Display::check_integrity`] detects.
#[derive(Debug, Clone)]
pub struct TextDisplay {
    current: Rows,
    pending: Rows,
    overlay: Rows,
    overlay_until: Option<Instant>,
    backlight: bool,
    refreshes: u64,
}

impl TextDisplay {
    pub fn new() -> Self {
        let mut row = [0u8; BUF_COLS];
        row[COLS + 1..].copy_from_slice(&SENTINEL.to_le_bytes());
        Self {
            current: [row; ROWS],
            pending: [row; ROWS],
            overlay: [row; ROWS],
            overlay_until: None,
            backlight: false,
            refreshes: 0,
        }
    }

    /// What the screen shows, NUL rendered as space.
    pub fn lines(&self) -> [String; ROWS] {
        std::array::from_fn(|row| {
            self.current[row][..COLS]
                .iter()
                .map(|&b| if b == 0 { ' ' } else { char::from(b) })
                .collect()
        })
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Raw pending row buffer, sentinel included.
    pub fn raw_row_mut(&mut self, row: usize) -> Option<&mut [u8; BUF_COLS]> {
        self.pending.get_mut(row)
    }

    fn write(buf: &mut Rows, col: usize, row: usize, text: &str) -> bool {
        if row >= ROWS || col >= COLS {
            return false;
        }
        let room = COLS - col;
        let bytes = text.as_bytes();
        let n = bytes.len().min(room);
        buf[row][col..col + n].copy_from_slice(&bytes[..n]);
        bytes.len() <= room
    }

    fn mark_corrupt(buf: &mut Rows) {
        for (row, word) in [(0, b"buffer".as_slice()), (1, b"corrupt".as_slice())] {
            buf[row][COLS - word.len()..COLS].copy_from_slice(word);
        }
    }
}

impl Default for TextDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TextDisplay {
    fn backlight(&self) -> bool {
        self.backlight
    }

    fn set_backlight(&mut self, on: bool) {
        self.backlight = on;
    }

    fn clear(&mut self) {
        for row in &mut self.pending {
            row[..COLS].fill(0);
        }
    }

    fn print(&mut self, col: usize, row: usize, text: &str) -> bool {
        Self::write(&mut self.pending, col, row, text)
    }

    fn overlay(&mut self, col: usize, row: usize, text: &str, timeout: Duration) -> bool {
        self.overlay_until = Some(Instant::now() + timeout);
        Self::write(&mut self.overlay, col, row, text)
    }

    fn overlay_clear(&mut self) {
        self.overlay_until = None;
        for row in &mut self.overlay {
            row[..COLS].fill(0);
        }
    }

    fn check_integrity(&mut self) -> bool {
        let intact = |row: &[u8; BUF_COLS], terminated: bool| {
            (!terminated || row[COLS] == 0) && row[COLS + 1..] == SENTINEL.to_le_bytes()
        };
        let ok = (0..ROWS).all(|r| {
            intact(&self.current[r], true)
                && intact(&self.pending[r], true)
                && intact(&self.overlay[r], false)
        });
        if !ok {
            self.overlay_until = None;
            Self::mark_corrupt(&mut self.current);
            Self::mark_corrupt(&mut self.pending);
            tracing::error!("display buffer corrupt");
        }
        ok
    }

    fn refresh(&mut self) -> bool {
        if self.overlay_until.is_none() && self.current == self.pending {
            return false;
        }
        for (current, pending) in self.current.iter_mut().zip(&self.pending) {
            current[..COLS].copy_from_slice(&pending[..COLS]);
        }
        if let Some(until) = self.overlay_until {
            if Instant::now() < until {
                for (current, overlay) in self.current.iter_mut().zip(&self.overlay) {
                    for (c, &o) in current[..COLS].iter_mut().zip(&overlay[..COLS]) {
                        if o != 0 {
                            *c = o;
                        }
                    }
                }
            } else {
                self.overlay_clear();
            }
        }
        self.refreshes += 1;
        true
    }
}
