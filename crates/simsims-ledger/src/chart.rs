//! Text plot of the recorded history.
//!
//! One column per sampled cycle, one glyph per tracked resource kind:
//! `W` workers, `P` products, `F` food, `*` where series overlap.

use simsims_events::{CycleRow, TRACKED_KINDS};

const GLYPHS: [char; 3] = ['W', 'P', 'F'];

/// Renders the rows as a `width` x `height` character plot with a legend.
///
/// When there are more rows than columns, rows are sampled evenly.
pub fn render_chart(rows: &[CycleRow], width: usize, height: usize) -> String {
    if rows.is_empty() || width == 0 || height == 0 {
        return String::from("(no cycles recorded)\n");
    }

    let columns = width.min(rows.len());
    let sampled: Vec<&CycleRow> = (0..columns)
        .map(|c| &rows[c * rows.len() / columns])
        .collect();

    let peak = sampled
        .iter()
        .flat_map(|r| r.counts.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut grid = vec![vec![' '; columns]; height];
    for (x, row) in sampled.iter().enumerate() {
        for (series, kind) in TRACKED_KINDS.iter().enumerate() {
            let value = row.count(*kind);
            let level = (value * (height as u64 - 1) + peak / 2) / peak;
            let y = height - 1 - level as usize;
            let cell = &mut grid[y][x];
            *cell = if *cell == ' ' { GLYPHS[series] } else { '*' };
        }
    }

    let label_width = peak.to_string().len();
    let mut out = String::new();
    for (y, line) in grid.iter().enumerate() {
        let label = if y == 0 {
            peak.to_string()
        } else if y == height - 1 {
            "0".to_string()
        } else {
            String::new()
        };
        out.push_str(&format!("{:>w$} |", label, w = label_width));
        out.extend(line.iter());
        out.push('\n');
    }
    out.push_str(&format!("{:>w$} +{}\n", "", "-".repeat(columns), w = label_width));
    out.push_str(&format!(
        "{:>w$}  cycles {}..={}   ",
        "",
        rows[0].cycle,
        rows[rows.len() - 1].cycle,
        w = label_width
    ));
    let legend: Vec<String> = TRACKED_KINDS
        .iter()
        .zip(GLYPHS.iter())
        .map(|(kind, glyph)| format!("{}={}", glyph, kind))
        .collect();
    out.push_str(&legend.join(" "));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsims_events::fixtures;

    #[test]
    fn test_empty_history() {
        assert_eq!(render_chart(&[], 40, 10), "(no cycles recorded)\n");
    }

    #[test]
    fn test_chart_dimensions() {
        let rows = fixtures::sample_history();
        let chart = render_chart(&rows, 40, 8);
        let lines: Vec<&str> = chart.lines().collect();

        // 8 plot rows, the axis, the legend
        assert_eq!(lines.len(), 10);
        assert!(lines[0].starts_with("42 |"));
        assert!(lines[9].contains("W=Worker"));
        assert!(lines[9].contains("cycles 0..=5"));
    }

    #[test]
    fn test_chart_samples_long_histories() {
        let rows: Vec<CycleRow> = (0..500)
            .map(|i| {
                let mut row = fixtures::sample_history()[0].clone();
                row.cycle = i;
                row
            })
            .collect();
        let chart = render_chart(&rows, 30, 5);
        let axis = chart.lines().nth(5).unwrap();
        assert_eq!(axis.matches('-').count(), 30);
    }

    #[test]
    fn test_extinct_series_touches_floor() {
        let rows = fixtures::sample_history();
        let chart = render_chart(&rows, 6, 4);
        let floor = chart.lines().nth(3).unwrap();
        // last sampled cycle has zero workers and zero food
        assert!(floor.ends_with('*'));
    }
}
