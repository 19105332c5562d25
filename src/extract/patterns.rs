use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use image::GrayImage;
use regex::{Captures, Regex};
use tracing::debug;

use super::{ExtractContext, FieldExtractor, PassOutput};
use crate::core::geometry::Rect;
use crate::core::model::{DocumentType, Field};
use crate::core::record::DocumentBuilder;
use crate::core::settings::RecognitionSettings;
use crate::layout::detector::find_data_regions;
use crate::ocr::OcrError;

/// How a matching pattern's captures become the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assemble {
    /// First capture group.
    Group,
    /// Groups 1-3 as `DD/MM/YYYY`.
    Date,
}

struct FieldRule {
    field: Field,
    assemble: Assemble,
    patterns: Vec<Regex>,
}

impl FieldRule {
    fn new(field: Field, assemble: Assemble, patterns: &[impl AsRef<str>]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()).expect("field pattern should compile"))
            .collect();
        Self {
            field,
            assemble,
            patterns,
        }
    }

    /// Value from the first pattern that matches `text`.
    fn find(&self, text: &str) -> Option<String> {
        let captures = self.patterns.iter().find_map(|p| p.captures(text))?;
        let value = match self.assemble {
            Assemble::Group => group(&captures, 1).to_string(),
            Assemble::Date => format!(
                "{}/{}/{}",
                group(&captures, 1),
                group(&captures, 2),
                group(&captures, 3)
            ),
        };
        Some(value.trim().to_string())
    }
}

fn group<'t>(captures: &Captures<'t>, index: usize) -> &'t str {
    captures.get(index).map_or("", |m| m.as_str())
}

const NAME_RUN: &str = r"((?:[A-Z\d]{3,}[ ]?)+)";
const COMPANY_RUN: &str = r"((?:[A-Z\d]{3,}[.\-]?[ ]?)+)";

static MANPOWER_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    vec![
        FieldRule::new(
            Field::FullName,
            Assemble::Group,
            &[format!(r"(?m)Name.*?worker.*?{NAME_RUN}")],
        ),
        FieldRule::new(
            Field::PassportNumber,
            Assemble::Group,
            &[r"(?m)Passport.*?No.*?([A-Z\d]{5,})"],
        ),
        FieldRule::new(
            Field::DateOfBirth,
            Assemble::Date,
            &[
                r"(?im)Date.*?Birth.*?(\d{2})/(\d{2})/(\d{4})",
                r"(?im)Date.*?Birth.*?(\d{2})[-./\\](\d{2})[-./\\](\d{4})",
            ],
        ),
        FieldRule::new(
            Field::WorkPermitNumber,
            Assemble::Group,
            &[r"(?im)WP.*?No.*?(\d{5,})"],
        ),
        FieldRule::new(
            Field::NricOrFinNumber,
            Assemble::Group,
            &[r"(?m)FIN.*?([A-Z]\d{5,}[A-Z])"],
        ),
        FieldRule::new(
            Field::Nationality,
            Assemble::Group,
            &[
                r"(?m)Nationality.*?([A-Z]{6,})",
                r"(?m)Nationality.*?([A-Z]{4,})",
            ],
        ),
        FieldRule::new(
            Field::Occupation,
            Assemble::Group,
            &[format!(r"(?m)Occupation.*?{NAME_RUN}")],
        ),
        FieldRule::new(
            Field::EmployerName,
            Assemble::Group,
            &[
                format!(r"(?m)Name.*?Employer.*?:.*?{COMPANY_RUN}"),
                format!(r"(?m)Name.*?Employer.*?\w\s*{COMPANY_RUN}"),
                format!(r"(?m)Name.*?Employer.*?{COMPANY_RUN}"),
            ],
        ),
        FieldRule::new(
            Field::EmployerTelephone,
            Assemble::Group,
            &[r"(?im)Employer.*?Tel.*?No.*?(\d{5,})"],
        ),
        FieldRule::new(
            Field::EmployerUen,
            Assemble::Group,
            &[
                r"(?im)CPF.*?Submission.*?No.*?(\d{6,}?\w-[a-z]{3}-\d{2})",
                r"(?im)CPF.*?Submission.*?No.*?(\d{6,}?\w[^a-z\d]*[a-z]{3}[^a-z\d]*\d{2})",
                r"(?im)(\d{6,}?\w[^a-z\d]*[a-z]{3}[^a-z\d]*\d{2})",
            ],
        ),
    ]
});

/// Applies the form's field patterns to `text`, filling only unset slots.
/// Returns the number of fields newly set.
pub fn apply_rules(text: &str, builder: &mut DocumentBuilder) -> usize {
    let mut found = 0;
    for rule in MANPOWER_RULES.iter() {
        if builder.is_set(rule.field) {
            continue;
        }
        if let Some(value) = rule.find(text) {
            if builder.set(rule.field, value) {
                found += 1;
            }
        }
    }
    found
}

/// Pattern-based extraction for the manpower form.
///
/// Each pass recognizes every page as a whole and applies the field
/// patterns to the flattened text. Fields still missing afterwards are
/// looked for row by row in the page's ruled table, when it has one.
pub struct PatternExtractor {
    ctx: ExtractContext,
    region_fallback: bool,
    regions: HashMap<usize, Vec<Rect>>,
}

impl PatternExtractor {
    pub fn new(ctx: ExtractContext) -> Self {
        Self {
            ctx,
            region_fallback: true,
            regions: HashMap::new(),
        }
    }

    pub fn with_region_fallback(mut self, enabled: bool) -> Self {
        self.region_fallback = enabled;
        self
    }

    fn page_regions(&mut self, index: usize, page: &GrayImage) -> &[Rect] {
        let detector = &self.ctx.detector;
        self.regions
            .entry(index)
            .or_insert_with(|| find_data_regions(detector.as_ref(), page))
    }
}

impl FieldExtractor for PatternExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::ManpowerForm
    }

    fn extract_pass(
        &mut self,
        pages: &[GrayImage],
        settings: &RecognitionSettings,
    ) -> Result<PassOutput, OcrError> {
        let mut builder = DocumentBuilder::new(DocumentType::ManpowerForm);
        let mut trace = String::new();

        for (index, page) in pages.iter().enumerate() {
            let recognized = self.ctx.engine.recognize(page, None, settings)?;
            let found = apply_rules(&recognized.flat_text(), &mut builder);
            let _ = writeln!(trace, "page {}: {} field(s) from full text", index + 1, found);
            trace.push_str(&recognized.text());

            if builder.is_complete() {
                break;
            }
            if !self.region_fallback {
                continue;
            }

            let regions = self.page_regions(index, page).to_vec();
            debug!(page = index + 1, regions = regions.len(), "searching table rows");
            for region in regions {
                if builder.is_complete() {
                    break;
                }
                let row = self.ctx.engine.recognize(page, Some(region), settings)?;
                let found = apply_rules(&row.flat_text(), &mut builder);
                if found > 0 {
                    let _ = writeln!(trace, "row {region:?}: {found} field(s)");
                }
            }
        }

        Ok(PassOutput {
            data: builder.build(),
            debug: trace,
        })
    }
}
