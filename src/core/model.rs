use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Supported document layouts. Declaration order is the classification order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Ministry of Manpower employment form: one ruled page of labelled text.
    ManpowerForm,
    /// Work-permit card scan, possibly with the visit-pass side on the same page.
    WorkPermitCard,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::ManpowerForm, DocumentType::WorkPermitCard];

    pub fn name(self) -> &'static str {
        match self {
            DocumentType::ManpowerForm => "manpower_form",
            DocumentType::WorkPermitCard => "work_permit_card",
        }
    }

    /// Ordered field descriptor table for records of this type.
    pub fn fields(self) -> &'static [Field] {
        match self {
            DocumentType::ManpowerForm => &MANPOWER_FIELDS,
            DocumentType::WorkPermitCard => &WORK_PERMIT_FIELDS,
        }
    }

    pub fn has_field(self, field: Field) -> bool {
        self.fields().contains(&field)
    }

    /// Keyword patterns scored by the classifier.
    pub fn keywords(self) -> &'static [Regex] {
        match self {
            DocumentType::ManpowerForm => &MANPOWER_KEYWORDS,
            DocumentType::WorkPermitCard => &WORK_PERMIT_KEYWORDS,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FullName,
    PassportNumber,
    DateOfBirth,
    WorkPermitNumber,
    NricOrFinNumber,
    Nationality,
    Occupation,
    EmployerName,
    EmployerTelephone,
    EmployerUen,
    WorkPermitCategory,
    WorkPermitExpirationDate,
    FinNumber,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::FullName => "full_name",
            Field::PassportNumber => "passport_number",
            Field::DateOfBirth => "date_of_birth",
            Field::WorkPermitNumber => "work_permit_number",
            Field::NricOrFinNumber => "nric_or_fin_number",
            Field::Nationality => "nationality",
            Field::Occupation => "occupation",
            Field::EmployerName => "employer_name",
            Field::EmployerTelephone => "employer_telephone",
            Field::EmployerUen => "employer_uen",
            Field::WorkPermitCategory => "work_permit_category",
            Field::WorkPermitExpirationDate => "work_permit_expiration_date",
            Field::FinNumber => "fin_number",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const MANPOWER_FIELDS: [Field; 10] = [
    Field::FullName,
    Field::PassportNumber,
    Field::DateOfBirth,
    Field::WorkPermitNumber,
    Field::NricOrFinNumber,
    Field::Nationality,
    Field::Occupation,
    Field::EmployerName,
    Field::EmployerTelephone,
    Field::EmployerUen,
];

const WORK_PERMIT_FIELDS: [Field; 8] = [
    Field::FullName,
    Field::DateOfBirth,
    Field::WorkPermitNumber,
    Field::WorkPermitCategory,
    Field::WorkPermitExpirationDate,
    Field::FinNumber,
    Field::Nationality,
    Field::EmployerName,
];

fn keyword_set(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("(?im){pattern}")).expect("keyword pattern should compile")
        })
        .collect()
}

static MANPOWER_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    keyword_set(&[
        r"foreign.*?worker",
        r"employment.*?details",
        r"employer.*?details",
        r"Name.*?Employer",
        r"WP.*?No",
        r"Name.*?worker",
        r"mom",
    ])
});

static WORK_PERMIT_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    keyword_set(&[
        r"work.*?permit",
        r"sector",
        r"foreign.*?manpower.*?act",
        r"visit.*?pass",
        r"immigration.*?regulations",
        r"surrender.*?this.*?card",
    ])
});

/// Quarter-turn orientation correction applied to a page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn next(self) -> Rotation {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
