//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, good for quick sanity checks of a fit and
//! deterministic enough for golden tests.
//!
//! Plot elements:
//! - observed survival frequencies: `o`
//! - standard error of the mean across repetitions: `|` span
//! - fitted curve: `-` line

use crate::domain::{MetricPair, SurvivalTable};
use crate::io::build_grid;
use crate::math::standard_error;
use crate::models::DecayModel;

/// Plot one group's survival data with its fitted curve.
///
/// The x axis runs from length 0 to the longest sequence length.
pub fn render_survival_plot(
    table: &SurvivalTable,
    shots: u32,
    model: DecayModel,
    metric: MetricPair,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = table
        .lengths()
        .into_iter()
        .map(f64::from)
        .zip(table.survival_freqs(shots))
        .collect();
    // (length, low, high) for lengths with more than one repetition.
    let bars: Vec<(f64, f64, f64)> = points
        .iter()
        .zip(table.rows().values())
        .filter_map(|(&(m, y), counts)| {
            let freqs: Vec<f64> = counts.iter().map(|&c| f64::from(c) / f64::from(shots)).collect();
            standard_error(&freqs).map(|se| (m, y - se, y + se))
        })
        .collect();
    let m_max = points.last().map_or(1.0, |&(m, _)| m.max(1.0));
    let grid_curve = build_grid(model, metric, m_max, width);
    let curve: Vec<(f64, f64)> = grid_curve
        .length
        .into_iter()
        .zip(grid_curve.survival)
        .collect();

    let bar_ends: Vec<(f64, f64)> = bars.iter().flat_map(|&(m, lo, hi)| [(m, lo), (m, hi)]).collect();
    let (y_lo, y_hi) = y_range(&points, &curve, &bar_ends).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_lo, y_hi, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then error bars, so points overlay both.
    draw_curve(&mut grid, &curve, 0.0, m_max, y_min, y_max);
    for &(m, lo, hi) in &bars {
        let x = map_x(m, 0.0, m_max, width);
        let top = map_y(hi, y_min, y_max, height);
        let bottom = map_y(lo, y_min, y_max, height);
        for row in &mut grid[top..=bottom] {
            row[x] = '|';
        }
    }
    for &(m, y) in &points {
        let x = map_x(m, 0.0, m_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = 'o';
    }

    let mut out = format!("Plot: length=[0, {m_max:.0}] | survival=[{y_lo:.2}, {y_hi:.2}]\n");
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn y_range(points: &[(f64, f64)], curve: &[(f64, f64)], bars: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points.iter().chain(curve).chain(bars) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(m: f64, m_min: f64, m_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((m - m_min) / (m_max - m_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], m_min: f64, m_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(m, y) in curve {
        let x = map_x(m, m_min, m_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, row, '-'),
            None => grid[row][x] = '-',
        }
        prev = Some((x, row));
    }
}

/// Bresenham line; only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x, mut y) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let dy = -(y1 - y).abs();
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y as usize)
            .and_then(|row| row.get_mut(x as usize))
            .filter(|c| **c == ' ')
        {
            *cell = ch;
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
