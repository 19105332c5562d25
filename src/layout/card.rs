use std::sync::LazyLock;

use regex::Regex;

use crate::core::geometry::Rect;
use crate::core::model::Field;
use crate::ocr::OcrPage;

/// How a sub-area's recognized text is turned into a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaKind {
    Text,
    Date,
}

/// A named sub-area as fractions of the card rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubArea {
    pub field: Field,
    pub kind: AreaKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SubArea {
    const fn new(field: Field, kind: AreaKind, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            field,
            kind,
            x,
            y,
            width,
            height,
        }
    }

    fn locate(&self, main: Rect) -> Rect {
        Rect::new(
            main.x + (main.width as f32 * self.x) as i32,
            main.y + (main.height as f32 * self.y) as i32,
            (main.width as f32 * self.width) as i32,
            (main.height as f32 * self.height) as i32,
        )
    }
}

const WORK_PERMIT_AREAS: [SubArea; 5] = [
    SubArea::new(Field::FullName, AreaKind::Text, 0.28, 0.35, 0.50, 0.05),
    SubArea::new(Field::WorkPermitCategory, AreaKind::Text, 0.14, 0.26, 0.36, 0.05),
    SubArea::new(Field::EmployerName, AreaKind::Text, 0.05, 0.19, 0.55, 0.05),
    SubArea::new(Field::WorkPermitNumber, AreaKind::Text, 0.05, 0.72, 0.40, 0.06),
    SubArea::new(Field::WorkPermitExpirationDate, AreaKind::Date, 0.55, 0.72, 0.40, 0.06),
];

const VISIT_PASS_AREAS: [SubArea; 3] = [
    SubArea::new(Field::DateOfBirth, AreaKind::Date, 0.31, 0.50, 0.17, 0.07),
    SubArea::new(Field::FinNumber, AreaKind::Text, 0.31, 0.65, 0.17, 0.07),
    SubArea::new(Field::Nationality, AreaKind::Text, 0.68, 0.50, 0.22, 0.08),
];

static WORK_PERMIT_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"WORK.*?PERMIT").expect("title pattern should compile"));

static VISIT_PASS_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VISIT.*?PASS").expect("title pattern should compile"));

/// The two card faces a work-permit scan may show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardSide {
    WorkPermit,
    VisitPass,
}

/// Multipliers on the title box that give the card outline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Proportions {
    /// Coarse half-width, in title half-widths.
    coarse_width: f32,
    /// Coarse extent above the title, in title heights.
    coarse_up: f32,
    /// Coarse extent below the title top, in title heights.
    coarse_down: f32,
    fine_width: f32,
    fine_height: f32,
}

impl CardSide {
    pub const ALL: [CardSide; 2] = [CardSide::WorkPermit, CardSide::VisitPass];

    pub fn name(self) -> &'static str {
        match self {
            CardSide::WorkPermit => "work_permit",
            CardSide::VisitPass => "visit_pass",
        }
    }

    pub fn title_pattern(self) -> &'static Regex {
        match self {
            CardSide::WorkPermit => &WORK_PERMIT_TITLE,
            CardSide::VisitPass => &VISIT_PASS_TITLE,
        }
    }

    /// Words whose boxes give the title's left/top and right/bottom edges.
    pub fn anchor_words(self) -> (&'static str, &'static str) {
        match self {
            CardSide::WorkPermit => ("WORK", "PERMIT"),
            CardSide::VisitPass => ("VISIT", "PASS"),
        }
    }

    pub fn sub_areas(self) -> &'static [SubArea] {
        match self {
            CardSide::WorkPermit => &WORK_PERMIT_AREAS,
            CardSide::VisitPass => &VISIT_PASS_AREAS,
        }
    }

    fn proportions(self) -> Proportions {
        match self {
            CardSide::WorkPermit => Proportions {
                coarse_width: 5.5,
                coarse_up: 2.0,
                coarse_down: 30.0,
                fine_width: 4.8,
                fine_height: 25.0,
            },
            CardSide::VisitPass => Proportions {
                coarse_width: 6.0,
                coarse_up: 2.0,
                coarse_down: 29.0,
                fine_width: 5.5,
                fine_height: 22.0,
            },
        }
    }
}

/// Bounding box of the first line matching the side's title, spanning from
/// the first anchor word's top-left to the second's bottom-right.
pub fn locate_title(side: CardSide, page: &OcrPage) -> Option<Rect> {
    let (first, second) = side.anchor_words();
    let line = page
        .lines
        .iter()
        .find(|line| side.title_pattern().is_match(&line.text()))?;

    let start = line.words.iter().find(|w| w.text.contains(first))?.bbox;
    let end = line
        .words
        .iter()
        .rev()
        .find(|w| w.text.contains(second) && !w.text.contains(first))?
        .bbox;

    let title = Rect::from_corners(start.x, start.y, end.right(), end.bottom());
    (!title.is_empty()).then_some(title)
}

/// Generous outline around a roughly located title, clipped to the image.
/// The region is meant to be cropped, deskewed and searched again.
pub fn estimate_location(side: CardSide, title: Rect, image_width: u32, image_height: u32) -> Rect {
    let p = side.proportions();
    let title_half = title.width / 2;
    let result_half = (title_half as f32 * p.coarse_width) as i32;
    Rect::new(
        title.x + title_half - result_half,
        title.y - (title.height as f32 * p.coarse_up) as i32,
        result_half * 2,
        (title.height as f32 * p.coarse_down) as i32,
    )
    .clip_to(image_width, image_height)
}

/// Card outline and field areas derived from a precisely located title.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub side: CardSide,
    pub title: Rect,
    pub main: Rect,
    pub areas: Vec<(SubArea, Rect)>,
}

impl CardLayout {
    pub fn new(side: CardSide, title: Rect, image_width: u32, image_height: u32) -> Self {
        let p = side.proportions();
        let title_half = title.width / 2;
        let result_half = (title_half as f32 * p.fine_width) as i32;
        let main = Rect::new(
            title.x + title_half - result_half,
            title.y,
            result_half * 2,
            (title.height as f32 * p.fine_height) as i32,
        )
        .clip_to(image_width, image_height);

        let areas = side
            .sub_areas()
            .iter()
            .map(|area| (*area, area.locate(main).clip_to(image_width, image_height)))
            .collect();

        Self {
            side,
            title,
            main,
            areas,
        }
    }

    pub fn area(&self, field: Field) -> Option<Rect> {
        self.areas
            .iter()
            .find(|(area, _)| area.field == field)
            .map(|(_, rect)| *rect)
    }
}
