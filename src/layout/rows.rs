use crate::core::geometry::{Line, Point, Rect};

/// Tuning for [`assemble_rows`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowParams {
    /// Max x-distance between corresponding ends of two lines bounding one row.
    pub pair_margin: f64,
    /// Trimmed off the right end of every row.
    pub right_trim: i32,
    /// Shrinks each emitted rectangle on all four sides.
    pub inset: i32,
    /// A lone column intersection within this fraction of the line length
    /// from one end tightens that side.
    pub column_reach: f64,
    /// Drop rectangles taller than twice their width.
    pub reject_tall: bool,
}

impl Default for RowParams {
    fn default() -> Self {
        Self {
            pair_margin: 50.0,
            right_trim: 30,
            inset: 4,
            column_reach: 0.4,
            reject_tall: true,
        }
    }
}

/// Turns ruled lines into row rectangles.
///
/// `horizontal` must be sorted top to bottom and `vertical` left to right,
/// both already deduplicated. Consecutive horizontal lines with matching
/// ends bound a row; an unpaired first line pairs with the top edge and an
/// unpaired last line with the bottom edge (`image_height`). Unpaired
/// interior lines are skipped. Column lines crossing a row's boundaries
/// narrow its horizontal extent.
pub fn assemble_rows(
    horizontal: &[Line],
    vertical: &[Line],
    image_height: u32,
    params: &RowParams,
) -> Vec<Rect> {
    let mut lines = horizontal.to_vec();
    let mut regions = Vec::new();
    let bottom = image_height as f64;

    let mut i = 0;
    while i < lines.len() {
        let line1 = lines[i];
        let line2 = if i == lines.len() - 1 {
            edge_line(&line1, bottom)
        } else if !line1.is_horizontal_pair(&lines[i + 1], params.pair_margin) {
            if i > 0 {
                i += 1;
                continue;
            }
            edge_line(&line1, 0.0)
        } else {
            lines.remove(i + 1)
        };

        if let Some(region) = row_region(&line1, &line2, vertical, params) {
            regions.push(region);
        }
        i += 1;
    }

    regions
}

fn edge_line(line: &Line, y: f64) -> Line {
    Line::from_coords(line.p1().x, y, line.p2().x, y)
}

fn row_region(line1: &Line, line2: &Line, vertical: &[Line], params: &RowParams) -> Option<Rect> {
    let mut x1 = line1.p1().x.max(line2.p1().x) as i32;
    let y1 = line1.p1().y.min(line2.p1().y) as i32;
    let mut x2 = line1.p2().x.min(line2.p2().x) as i32 - params.right_trim;
    let y2 = line1.p1().y.max(line2.p1().y) as i32;

    for boundary in [line1, line2] {
        let (left, right) = column_bounds(boundary, vertical, params.column_reach);
        if let Some(left) = left {
            x1 = x1.max(left);
        }
        if let Some(right) = right {
            x2 = x2.min(right);
        }
    }

    let region = Rect::from_corners(x1, y1, x2, y2).inset(params.inset);
    let too_tall = params.reject_tall && region.height >= 2 * region.width;
    if region.is_empty() || too_tall {
        None
    } else {
        Some(region)
    }
}

/// Left/right x limits implied by the column lines crossing `boundary`.
fn column_bounds(boundary: &Line, vertical: &[Line], reach: f64) -> (Option<i32>, Option<i32>) {
    let crossings: Vec<Point> = vertical
        .iter()
        .filter_map(|column| boundary.intersection(column))
        .collect();

    match crossings.as_slice() {
        [] => (None, None),
        [point] => {
            let limit = boundary.length() * reach;
            if point.distance(&boundary.p1()) < limit {
                (Some(point.x as i32), None)
            } else if point.distance(&boundary.p2()) < limit {
                (None, Some(point.x as i32))
            } else {
                (None, None)
            }
        }
        points => {
            let leftmost = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
            let rightmost = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
            (Some(leftmost as i32), Some(rightmost as i32))
        }
    }
}
