//! Layout - tiles the host terminal into one bordered box per session
//!
//! Sessions fill a grid of C columns, C being the smallest integer with
//! C * C >= N. Columns hold N / C or N / C + 1 tiles; the taller columns sit
//! on the right. Sessions are placed column-major in registry order.

use crate::core::term::{MAX_COLS, MAX_ROWS};

/// A session box on the host terminal.
///
/// `(x, y)` is the 1-based top-left border corner. `width` x `height` is
/// the content area, which starts one cell in from the corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Column of the right border
    pub fn right(&self) -> u16 {
        self.x + self.width + 1
    }

    /// Row of the bottom border
    pub fn bottom(&self) -> u16 {
        self.y + self.height + 1
    }

    /// Host position of content cell `(cx, cy)`
    pub fn screen_pos(&self, cx: u16, cy: u16) -> (u16, u16) {
        (self.x + cx, self.y + cy)
    }

    /// Whether a host position falls inside the box, border included
    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col <= self.right() && row >= self.y && row <= self.bottom()
    }

    /// Content-relative position of a host position, clamped into the box
    pub fn to_local(&self, col: u16, row: u16) -> (u16, u16) {
        let cx = col.saturating_sub(self.x).clamp(1, self.width.max(1));
        let cy = row.saturating_sub(self.y).clamp(1, self.height.max(1));
        (cx, cy)
    }
}

/// Column count and per-column tile counts for `count` sessions
pub fn mosaic(count: usize) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let mut columns = 1;
    while columns * columns < count {
        columns += 1;
    }
    let base = count / columns;
    let extra = count % columns;
    (0..columns)
        .map(|c| {
            if extra != 0 && c >= columns - extra {
                base + 1
            } else {
                base
            }
        })
        .collect()
}

/// Compute one rect per session for a `cols` x `rows` host terminal
pub fn tile(count: usize, cols: u16, rows: u16) -> Vec<Rect> {
    let columns = mosaic(count);
    if columns.is_empty() {
        return Vec::new();
    }

    let col_w = cols / columns.len() as u16;
    let width = col_w.saturating_sub(2).clamp(1, MAX_COLS);

    let mut rects = Vec::with_capacity(count);
    for (c, &tiles) in columns.iter().enumerate() {
        let tiles = tiles as u32;
        let tile_h = rows as u32 / tiles;
        let height = (tile_h.saturating_sub(2) as u16).clamp(1, MAX_ROWS);
        let x = c as u16 * col_w + 1;
        for r in 0..tiles {
            let y = (r * rows as u32 / tiles) as u16 + 1;
            rects.push(Rect::new(x, y, width, height));
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn overlaps(a: &Rect, b: &Rect) -> bool {
        a.x <= b.right() && b.x <= a.right() && a.y <= b.bottom() && b.y <= a.bottom()
    }

    #[test]
    fn test_mosaic_shapes() {
        assert_eq!(mosaic(1), vec![1]);
        assert_eq!(mosaic(2), vec![1, 1]);
        assert_eq!(mosaic(3), vec![1, 2]);
        assert_eq!(mosaic(4), vec![2, 2]);
        assert_eq!(mosaic(5), vec![1, 2, 2]);
        assert_eq!(mosaic(7), vec![2, 2, 3]);
        assert_eq!(mosaic(16), vec![4, 4, 4, 4]);
        assert!(mosaic(0).is_empty());
    }

    #[test]
    fn test_single_session_fills_terminal() {
        let rects = tile(1, 80, 24);
        assert_eq!(rects, vec![Rect::new(1, 1, 78, 22)]);
        assert_eq!(rects[0].right(), 80);
        assert_eq!(rects[0].bottom(), 24);
    }

    #[test]
    fn test_three_sessions_column_major() {
        let rects = tile(3, 80, 24);
        assert_eq!(rects[0], Rect::new(1, 1, 38, 22));
        assert_eq!(rects[1], Rect::new(41, 1, 38, 10));
        assert_eq!(rects[2], Rect::new(41, 13, 38, 10));
    }

    #[test]
    fn test_tiny_terminal_clamps_to_one_cell() {
        let rects = tile(4, 2, 2);
        assert!(rects.iter().all(|r| r.width == 1 && r.height == 1));
    }

    #[test]
    fn test_large_terminal_clamps_box() {
        let rects = tile(1, 1000, 500);
        assert_eq!(rects[0].width, MAX_COLS);
        assert_eq!(rects[0].height, MAX_ROWS);
    }

    #[test]
    fn test_rect_geometry() {
        let rect = Rect::new(41, 13, 38, 10);
        assert_eq!(rect.screen_pos(1, 1), (42, 14));
        assert!(rect.contains(41, 13));
        assert!(rect.contains(80, 24));
        assert!(!rect.contains(40, 13));
        assert_eq!(rect.to_local(45, 16), (4, 3));
        assert_eq!(rect.to_local(41, 13), (1, 1));
        assert_eq!(rect.to_local(200, 200), (38, 10));
    }

    proptest! {
        #[test]
        fn prop_column_heights_differ_by_at_most_one(count in 1usize..=64) {
            let columns = mosaic(count);
            prop_assert_eq!(columns.iter().sum::<usize>(), count);
            let min = columns.iter().min().copied().unwrap_or(0);
            let max = columns.iter().max().copied().unwrap_or(0);
            prop_assert!(max - min <= 1);
            prop_assert!(columns.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn prop_tiles_fit_and_do_not_overlap(
            count in 1usize..=16,
            cols in 12u16..=400,
            rows in 12u16..=200,
        ) {
            let rects = tile(count, cols, rows);
            prop_assert_eq!(rects.len(), count);
            for (i, a) in rects.iter().enumerate() {
                prop_assert!(a.x >= 1 && a.y >= 1);
                prop_assert!(a.right() <= cols && a.bottom() <= rows);
                for b in rects.iter().skip(i + 1) {
                    prop_assert!(!overlaps(a, b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }
}
