//! Groups positioned runs into reading-order lines.

use super::content::TextRun;

/// How close runs must be to share a line or a word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Largest horizontal gap (pt) joined without a space.
    pub x: f32,
    /// Largest baseline difference (pt) still on the same line.
    pub y: f32,
}

impl Tolerance {
    /// Tight words, generous baselines; keeps columns apart.
    pub const STRICT: Self = Self { x: 1.5, y: 5.0 };
    /// Looser words, tighter baselines.
    pub const LOOSE: Self = Self { x: 3.0, y: 3.0 };
}

/// Gaps wider than this many font sizes are treated as column breaks.
const COLUMN_GAP_EM: f32 = 1.0;

/// Below this average token length the output is letter-spaced garbage.
const MIN_AVG_TOKEN_LEN: f32 = 1.5;

/// Assemble runs into trimmed, non-empty lines, top of the page first.
pub fn assemble_lines(runs: &[TextRun], tolerance: Tolerance) -> Vec<String> {
    let mut ordered: Vec<&TextRun> = runs.iter().collect();
    ordered.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<&TextRun>> = Vec::new();
    let mut anchor = f32::NAN;
    for run in ordered {
        match rows.last_mut() {
            Some(row) if (anchor - run.y).abs() <= tolerance.y => row.push(run),
            _ => {
                anchor = run.y;
                rows.push(vec![run]);
            }
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            join_row(&row, tolerance)
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn join_row(row: &[&TextRun], tolerance: Tolerance) -> String {
    let mut line = String::new();
    let mut cursor: Option<f32> = None;
    for run in row {
        if let Some(end) = cursor {
            let gap = run.x - end;
            let separated = line.ends_with(' ') || run.text.starts_with(' ');
            if gap > COLUMN_GAP_EM * run.size.max(1.0) {
                line.truncate(line.trim_end().len());
                line.push_str("  ");
            } else if gap > tolerance.x && !separated {
                line.push(' ');
            }
        }
        line.push_str(&run.text);
        let end = run.x + run.width;
        cursor = Some(cursor.map_or(end, |c| c.max(end)));
    }
    line.trim().to_string()
}

/// True when lines look letter-spaced ("S A L D O").
pub fn is_fragmented(lines: &[String]) -> bool {
    let (tokens, chars) = lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .fold((0usize, 0usize), |(tokens, chars), token| {
            (tokens + 1, chars + token.chars().count())
        });
    if tokens == 0 {
        return false;
    }
    #[allow(clippy::cast_precision_loss)]
    let average = chars as f32 / tokens as f32;
    average < MIN_AVG_TOKEN_LEN
}
