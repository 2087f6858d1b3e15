/// Cursor and scroll position over a row set that may be taller than the
/// screen.
///
/// `cursor_line` is 1-based. While rows exist the cursor always sits inside
/// the window `(scroll_offset, scroll_offset + visible_height]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    cursor_line: usize,
    scroll_offset: usize,
    visible_height: usize,
    row_count: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Viewport {
    pub fn new(visible_height: usize) -> Self {
        Self {
            cursor_line: 1,
            scroll_offset: 0,
            visible_height: visible_height.max(1),
            row_count: 0,
        }
    }

    pub fn cursor_line(&self) -> usize {
        self.cursor_line
    }

    #[cfg(test)]
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[cfg(test)]
    pub fn visible_height(&self) -> usize {
        self.visible_height
    }

    /// Index into the row set of the selected row, if any.
    pub fn selected(&self) -> Option<usize> {
        (self.row_count > 0).then(|| self.cursor_line - 1)
    }

    /// Row indices currently on screen.
    pub fn window(&self) -> std::ops::Range<usize> {
        let end = self
            .scroll_offset
            .saturating_add(self.visible_height)
            .min(self.row_count);
        self.scroll_offset.min(end)..end
    }

    /// Adopts a new terminal height; the window shrinks or grows around the
    /// cursor.
    pub fn resize(&mut self, visible_height: usize) {
        self.visible_height = visible_height.max(1);
        self.clamp();
    }

    /// Adopts this tick's row count.
    pub fn sync(&mut self, row_count: usize) {
        self.row_count = row_count;
        self.clamp();
    }

    pub fn move_down(&mut self) {
        if self.cursor_line < self.row_count {
            self.cursor_line += 1;
            let bottom = self.scroll_offset + self.visible_height;
            if self.cursor_line > bottom && self.row_count > bottom {
                self.scroll_offset += 1;
            }
        }
    }

    pub fn move_up(&mut self) {
        if self.cursor_line > 1 {
            self.cursor_line -= 1;
            if self.cursor_line <= self.scroll_offset && self.scroll_offset > 0 {
                self.scroll_offset -= 1;
            }
        }
    }

    pub fn page_down(&mut self) {
        for _ in 0..self.visible_height {
            self.move_down();
        }
    }

    pub fn page_up(&mut self) {
        for _ in 0..self.visible_height {
            self.move_up();
        }
    }

    pub fn jump_top(&mut self) {
        self.cursor_line = 1;
        self.scroll_offset = 0;
    }

    pub fn jump_bottom(&mut self) {
        self.cursor_line = self.row_count.max(1);
        self.scroll_offset = self.max_offset();
    }

    /// Steps off the last row ahead of its removal by a pending shutdown.
    ///
    /// Only the last row moves: removing any other row shifts the next one
    /// under the cursor. This is narrower than stepping up from the bottom
    /// row of the window, which would select the wrong row after a removal
    /// in the middle of the list. If the shutdown never lands, the next sync
    /// keeps whatever row is there.
    pub fn anticipate_removal(&mut self) {
        if self.row_count > 1 && self.cursor_line == self.row_count {
            self.move_up();
        }
    }

    fn max_offset(&self) -> usize {
        self.row_count.saturating_sub(self.visible_height)
    }

    fn clamp(&mut self) {
        if self.row_count == 0 {
            self.cursor_line = 1;
            self.scroll_offset = 0;
            return;
        }
        self.cursor_line = self.cursor_line.clamp(1, self.row_count);
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
        if self.cursor_line <= self.scroll_offset {
            self.scroll_offset = self.cursor_line - 1;
        } else if self.cursor_line > self.scroll_offset + self.visible_height {
            self.scroll_offset = self.cursor_line - self.visible_height;
        }
    }
}
