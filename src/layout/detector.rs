use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, grayscale_open, Mask};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::core::geometry::{accept_distinct, Line, Rect, DEFAULT_NEAR_DISTANCE};
use crate::layout::rows::{assemble_rows, RowParams};

/// Shortest ruling considered part of a table.
pub const MIN_RULE_LENGTH: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Finds straight ruled lines in a page image.
pub trait LineDetector: Send + Sync {
    fn detect_lines(&self, image: &GrayImage, orientation: Orientation, min_length: u32) -> Vec<Line>;
}

/// Binarizes the page, opens it with a long line-shaped kernel so only
/// strokes in the wanted direction survive, then labels what is left.
/// Pieces of one rule that step between pixel rows (slightly skewed scans)
/// or are broken by small gaps are joined by a dilation before labelling.
#[derive(Debug, Clone)]
pub struct MorphologyDetector {
    /// Pixels at or below this level count as ink.
    pub ink_level: u8,
    /// Gaps up to about twice this many pixels are bridged.
    pub bridge: u8,
}

impl Default for MorphologyDetector {
    fn default() -> Self {
        Self {
            ink_level: 127,
            bridge: 2,
        }
    }
}

impl MorphologyDetector {
    /// Ink of `image` belonging to strokes about `min_length / 4` or longer
    /// in `orientation`, as white on black.
    fn strokes(&self, image: &GrayImage, orientation: Orientation, min_length: u32) -> GrayImage {
        let ink = threshold(image, self.ink_level, ThresholdType::BinaryInverted);
        let half = (min_length / 8).clamp(1, 255);
        let length = 2 * half + 1;
        let kernel = match orientation {
            Orientation::Horizontal => {
                Mask::from_image(&GrayImage::from_pixel(length, 1, Luma([255])), half as u8, 0)
            }
            Orientation::Vertical => {
                Mask::from_image(&GrayImage::from_pixel(1, length, Luma([255])), 0, half as u8)
            }
        };
        grayscale_open(&ink, &kernel)
    }
}

impl LineDetector for MorphologyDetector {
    fn detect_lines(&self, image: &GrayImage, orientation: Orientation, min_length: u32) -> Vec<Line> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }

        let strokes = self.strokes(image, orientation, min_length);
        let joined = dilate(&strokes, Norm::LInf, self.bridge);
        let labels = connected_components(&joined, Connectivity::Eight, Luma([0u8]));

        // Extents come from the stroke pixels only, so the dilation never
        // lengthens a rule.
        let mut extents: BTreeMap<u32, Extent> = BTreeMap::new();
        for (x, y, pixel) in strokes.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            let label = labels.get_pixel(x, y)[0];
            let (along, across) = match orientation {
                Orientation::Horizontal => (x, y),
                Orientation::Vertical => (y, x),
            };
            extents
                .entry(label)
                .and_modify(|extent| extent.add(along, across))
                .or_insert_with(|| Extent::new(along, across));
        }

        let candidates: Vec<Line> = extents
            .values()
            .filter(|extent| extent.len() >= min_length)
            .map(|extent| extent.line(orientation))
            .collect();
        accept_distinct(candidates, DEFAULT_NEAR_DISTANCE)
    }
}

/// Running bounds of one labelled stroke along its direction, with the
/// mean cross position at each end.
#[derive(Debug, Clone, Copy)]
struct Extent {
    start: u32,
    start_sum: u64,
    start_count: u32,
    end: u32,
    end_sum: u64,
    end_count: u32,
}

impl Extent {
    fn new(along: u32, across: u32) -> Self {
        Self {
            start: along,
            start_sum: across as u64,
            start_count: 1,
            end: along,
            end_sum: across as u64,
            end_count: 1,
        }
    }

    fn add(&mut self, along: u32, across: u32) {
        if along < self.start {
            self.start = along;
            self.start_sum = 0;
            self.start_count = 0;
        }
        if along == self.start {
            self.start_sum += across as u64;
            self.start_count += 1;
        }
        if along > self.end {
            self.end = along;
            self.end_sum = 0;
            self.end_count = 0;
        }
        if along == self.end {
            self.end_sum += across as u64;
            self.end_count += 1;
        }
    }

    fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    fn line(&self, orientation: Orientation) -> Line {
        let start = self.start as f64;
        let end = self.end as f64;
        let start_across = self.start_sum as f64 / self.start_count as f64;
        let end_across = self.end_sum as f64 / self.end_count as f64;
        match orientation {
            Orientation::Horizontal => Line::from_coords(start, start_across, end, end_across),
            Orientation::Vertical => Line::from_coords(start_across, start, end_across, end),
        }
    }
}

/// Row regions of a ruled form page, top to bottom.
pub fn find_data_regions(detector: &dyn LineDetector, image: &GrayImage) -> Vec<Rect> {
    let mut horizontal: Vec<Line> = detector
        .detect_lines(image, Orientation::Horizontal, MIN_RULE_LENGTH)
        .into_iter()
        .filter(Line::is_horizontal)
        .collect();
    horizontal.sort_by(|a, b| a.p1().y.total_cmp(&b.p1().y));

    let mut vertical: Vec<Line> = detector
        .detect_lines(image, Orientation::Vertical, MIN_RULE_LENGTH)
        .into_iter()
        .filter(Line::is_vertical)
        .collect();
    vertical.sort_by(|a, b| a.p1().x.total_cmp(&b.p1().x));

    assemble_rows(&horizontal, &vertical, image.height(), &RowParams::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use pretty_assertions::assert_eq;

    fn ruled_form() -> GrayImage {
        let mut image = GrayImage::from_pixel(900, 700, Luma([255]));
        // Two thick rules bounding one row, plus two columns.
        for y in [100u32, 101, 102, 300, 301, 302] {
            for x in 50..851 {
                image.put_pixel(x, y, Luma([0]));
            }
        }
        for x in [100u32, 101, 800, 801] {
            for y in 60..351 {
                image.put_pixel(x, y, Luma([0]));
            }
        }
        image
    }

    #[test]
    fn detects_each_rule_once() {
        let detector = MorphologyDetector::default();
        let image = ruled_form();

        let horizontal = detector.detect_lines(&image, Orientation::Horizontal, MIN_RULE_LENGTH);
        assert_eq!(horizontal.len(), 2);
        assert!(horizontal.iter().all(Line::is_horizontal));

        let vertical = detector.detect_lines(&image, Orientation::Vertical, MIN_RULE_LENGTH);
        assert_eq!(vertical.len(), 2);
        assert!(vertical.iter().all(Line::is_vertical));
    }

    #[test]
    fn short_marks_are_ignored() {
        let mut image = GrayImage::from_pixel(400, 400, Luma([255]));
        for x in 10..110 {
            image.put_pixel(x, 200, Luma([0]));
        }
        let detector = MorphologyDetector::default();
        assert!(detector
            .detect_lines(&image, Orientation::Horizontal, MIN_RULE_LENGTH)
            .is_empty());
    }

    #[test]
    fn finds_ruled_row() {
        let regions = find_data_regions(&MorphologyDetector::default(), &ruled_form());
        // The rules meet both columns, so the row spans column to column.
        assert_eq!(regions.len(), 1);
        let row = regions[0];
        assert_eq!((row.x, row.y), (104, 105));
        assert_eq!(row.right(), 796);
        assert_eq!(row.bottom(), 297);
    }

    #[test]
    fn skewed_rule_stays_whole() {
        // 800px rule, two pixels thick, dropping one row every 250px.
        let mut image = GrayImage::from_pixel(1000, 400, Luma([255]));
        for x in 100..900u32 {
            let y = 200 + (x - 100) / 250;
            image.put_pixel(x, y, Luma([0]));
            image.put_pixel(x, y + 1, Luma([0]));
        }

        let lines =
            MorphologyDetector::default().detect_lines(&image, Orientation::Horizontal, MIN_RULE_LENGTH);
        assert_eq!(lines.len(), 1);
        let rule = lines[0];
        assert!(rule.is_horizontal());
        assert!(rule.length() > 790.0, "length {}", rule.length());
        assert_eq!((rule.p1().x, rule.p2().x), (100.0, 899.0));
    }

    #[test]
    fn text_strokes_are_not_rules() {
        let mut image = GrayImage::from_pixel(600, 300, Luma([255]));
        // A line of short glyph-sized blobs spanning the page.
        for x0 in (20..580u32).step_by(14) {
            for x in x0..x0 + 9 {
                for y in 100..116 {
                    image.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let detector = MorphologyDetector::default();
        assert!(detector
            .detect_lines(&image, Orientation::Horizontal, MIN_RULE_LENGTH)
            .is_empty());
        assert!(detector
            .detect_lines(&image, Orientation::Vertical, MIN_RULE_LENGTH)
            .is_empty());
    }

    #[test]
    fn blank_page_has_no_regions() {
        let image = GrayImage::from_pixel(300, 300, Luma([255]));
        assert!(find_data_regions(&MorphologyDetector::default(), &image).is_empty());
    }
}
