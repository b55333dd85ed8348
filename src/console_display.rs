use crate::keyboard::KeyboardLayout;
use crate::types::*;
use crossbeam_channel::Receiver;
use std::io::{self, Write};

/// Terminal rows covering y = 0..100. Four key-space units per row.
const ROWS: usize = 25;
const UNITS_PER_ROW: f32 = 100.0 / ROWS as f32;
const COLS: usize = KEY_COUNT + 1;
/// Top of the black keys
const BLACK_KEY_TOP: f32 = 12.0;

#[derive(Clone, Copy)]
struct Cell {
    ch: char,
    color: Option<[u8; 3]>,
}

const BLANK: Cell = Cell { ch: ' ', color: None };

/// Paints draw-lists as a truecolor ANSI dashboard: falling shapes above,
/// the 88-key keyboard below.
pub struct ConsoleDisplay {
    rx: Receiver<DrawList>,
    keyboard: KeyboardLayout,
    /// Paint every Nth draw-list
    skip: u64,
}

impl ConsoleDisplay {
    pub fn new(rx: Receiver<DrawList>, keyboard: KeyboardLayout, tick_hz: u32, update_hz: u32) -> Self {
        let skip = if update_hz == 0 { 1 } else { (tick_hz / update_hz).max(1) as u64 };
        Self { rx, keyboard, skip }
    }

    pub fn run(&self) {
        let mut count: u64 = 0;
        let mut stdout = io::stdout();

        for list in self.rx.iter() {
            count += 1;
            if count % self.skip != 0 {
                continue;
            }
            // Clear screen and move cursor home
            print!("\x1b[2J\x1b[H{}", self.render(&list));
            let _ = stdout.flush();
        }
    }

    /// One full frame as a string with ANSI color codes.
    pub fn render(&self, list: &DrawList) -> String {
        let mut grid = [[BLANK; COLS]; ROWS];
        self.paint_keyboard(&mut grid);
        for shape in &list.shapes {
            paint_shape(&mut grid, shape);
        }

        let mut out = String::with_capacity(ROWS * COLS * 4);
        out.push_str(&format!(
            "╔ SEE MUSIC ═ {:<13} t={:>7.2}s  tick {:>6}  shapes {:>4}\n",
            list.mode.name(),
            list.time,
            list.tick,
            list.len()
        ));
        for row in grid.iter() {
            out.push('║');
            for cell in row.iter() {
                match cell.color {
                    Some([r, g, b]) => {
                        out.push_str(&format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, cell.ch))
                    }
                    None => out.push(cell.ch),
                }
            }
            out.push('\n');
        }
        out
    }

    fn paint_keyboard(&self, grid: &mut [[Cell; COLS]; ROWS]) {
        for row in 0..ROWS {
            let y = row_to_y(row);
            if y >= KEYBOARD_Y {
                continue;
            }
            for &k in &self.keyboard.white_keys {
                grid[row][k as usize] = Cell { ch: '█', color: Some([235, 235, 235]) };
            }
            if y >= BLACK_KEY_TOP {
                for &k in &self.keyboard.black_keys {
                    grid[row][k as usize] = Cell { ch: '█', color: Some([40, 40, 40]) };
                }
            }
        }
    }
}

/// Key-space y at the middle of terminal row `row` (row 0 is the top).
fn row_to_y(row: usize) -> f32 {
    100.0 - (row as f32 + 0.5) * UNITS_PER_ROW
}

fn y_to_row(y: f32) -> Option<usize> {
    if !(0.0..100.0).contains(&y) {
        return None;
    }
    Some(((100.0 - y) / UNITS_PER_ROW) as usize).filter(|&r| r < ROWS)
}

fn x_to_col(x: f32) -> Option<usize> {
    let c = x.round();
    (c >= 0.0 && (c as usize) < COLS).then_some(c as usize)
}

fn plot(grid: &mut [[Cell; COLS]; ROWS], p: Point, ch: char, color: Rgb) {
    if let (Some(col), Some(row)) = (x_to_col(p.x), y_to_row(p.y)) {
        grid[row][col] = Cell { ch, color: Some(color.to_u8()) };
    }
}

fn paint_shape(grid: &mut [[Cell; COLS]; ROWS], shape: &Shape) {
    match shape {
        Shape::Star { center, color, .. } => plot(grid, *center, '★', *color),
        Shape::Circle { center, color, .. } => plot(grid, *center, '●', *color),
        Shape::Rect { origin, width, height, color, .. } => {
            let x = origin.x + width / 2.0;
            let mut y = origin.y;
            let top = origin.y + height.max(0.0);
            while y <= top {
                plot(grid, Point::new(x, y), '█', *color);
                y += UNITS_PER_ROW;
            }
        }
        Shape::Polyline { points, color, .. } => {
            for p in points {
                plot(grid, *p, '•', *color);
            }
        }
    }
}
