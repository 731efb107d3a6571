//! Column layout
//!
//! Lays lists of styled names out in column-major order, every cell cut
//! or padded to the terminal width of the widest item.

use crate::ansi::{Style, StyledText};

/// Lay `items` out in as many columns as fit in `width`
///
/// Columns are separated by one space and every row ends with a newline.
/// Widths are terminal columns, so double-width characters count twice.
/// Items wider than `width` are truncated.
pub fn columns(items: &[StyledText], width: usize) -> StyledText {
    if items.is_empty() {
        return StyledText::default();
    }

    let width = width.max(1);
    let cell_width = items
        .iter()
        .map(StyledText::display_width)
        .max()
        .unwrap_or(1)
        .clamp(1, width);
    let ncols = ((width + 1) / (cell_width + 1)).max(1);
    let nrows = items.len().div_ceil(ncols);
    let pad = Style::reset();

    let mut out = StyledText::default();
    for row in 0..nrows {
        let cells: Vec<StyledText> = (0..ncols)
            .filter_map(|col| items.get(col * nrows + row))
            .map(|item| item.fit_width(cell_width, &pad))
            .collect();

        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                out += " ";
            }
            out += cell;
        }
        out += "\n";
    }
    out
}
