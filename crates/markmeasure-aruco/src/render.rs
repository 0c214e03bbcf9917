use crate::Dictionary;
use markmeasure_core::GrayImage;

/// Draw symbol `id` with a one-cell black border inside a white quiet zone.
///
/// Each bit cell is `cell_px` square. Returns `None` for an unknown id or a
/// zero cell size.
pub fn render_marker(dict: &Dictionary, id: u32, cell_px: usize, quiet_px: usize) -> Option<GrayImage> {
    let code = dict.code(id)?;
    if cell_px == 0 {
        return None;
    }
    let bits = dict.marker_size;
    let cells = bits + 2;
    let side = cells * cell_px + 2 * quiet_px;
    let mut img = GrayImage::filled(side, side, 255);

    for cy in 0..cells {
        for cx in 0..cells {
            let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let black = border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
            if !black {
                continue;
            }
            for yy in 0..cell_px {
                let row = (quiet_px + cy * cell_px + yy) * side;
                let x0 = quiet_px + cx * cell_px;
                img.data[row + x0..row + x0 + cell_px].fill(0);
            }
        }
    }

    Some(img)
}
