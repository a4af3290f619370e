/// Terminal width from `COLUMNS`, if set to something usable.
#[must_use]
pub fn terminal_width() -> Option<usize> {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|w| *w >= 40)
}

const MIN_COLUMN: usize = 4;
const GAP: &str = "  ";

/// Left-aligned columns under a dashed divider. Columns shrink, widest first,
/// until the table fits `max_width`.
#[must_use]
pub fn render(headers: &[String], rows: &[Vec<String>], max_width: Option<usize>) -> String {
    let mut widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    if let Some(max_width) = max_width {
        shrink(&mut widths, max_width);
    }

    let line = |cells: &[String]| {
        widths
            .iter()
            .enumerate()
            .map(|(i, width)| pad(cells.get(i).map_or("-", String::as_str), *width))
            .collect::<Vec<_>>()
            .join(GAP)
            .trim_end()
            .to_string()
    };

    let header = line(headers);
    let divider = "-".repeat(header.chars().count());
    let mut out = vec![header, divider];
    out.extend(rows.iter().map(|row| line(row)));
    out.join("\n")
}

fn shrink(widths: &mut [usize], max_width: usize) {
    let total = |w: &[usize]| w.iter().sum::<usize>() + GAP.len() * w.len().saturating_sub(1);
    while total(widths) > max_width {
        let Some((i, _)) = widths
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > MIN_COLUMN)
            .max_by_key(|(_, w)| **w)
        else {
            break;
        };
        widths[i] -= 1;
    }
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len > width {
        let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        return cut;
    }
    format!("{value}{}", " ".repeat(width - len))
}
