//! Ordered classifier rules deciding which naming branch an object takes.

use crate::models::level::LEVEL_REGION;

/// Naming branch selected for an address object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Autonomous okrug: formal name, then classifier
    AutonomousOkrug,
    /// City: classifier, then formal name
    City,
    /// Level-1 objects with region-specific overrides
    Region,
    /// District: masculine singular transform, like `Masculine`
    District,
    /// Masculine singular nouns (quarter, avenue, passage, lane)
    Masculine,
    /// Feminine singular nouns (line, square)
    Feminine { square: bool },
    /// Street: classifier, then formal name
    Street,
    Default,
}

#[derive(Debug, Clone, Copy)]
enum Selector {
    Codes(&'static [u32]),
    Level(u32),
}

/// One entry of the ordered rule list
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub category: Category,
    selector: Selector,
    /// Short name the classifier code must carry for the rule to apply
    pub expected_short: Option<&'static str>,
}

impl Rule {
    const fn codes(category: Category, codes: &'static [u32], expected: &'static str) -> Self {
        Self {
            category,
            selector: Selector::Codes(codes),
            expected_short: Some(expected),
        }
    }

    const fn level(category: Category, level: u32) -> Self {
        Self {
            category,
            selector: Selector::Level(level),
            expected_short: None,
        }
    }

    pub fn matches(&self, code: u32, level: u32) -> bool {
        match self.selector {
            Selector::Codes(codes) => codes.contains(&code),
            Selector::Level(l) => l == level,
        }
    }
}

/// First match wins.
pub static RULES: &[Rule] = &[
    Rule::codes(Category::AutonomousOkrug, &[101, 201, 305], "АО"),
    Rule::codes(Category::City, &[103, 401, 605], "г"),
    Rule::level(Category::Region, LEVEL_REGION),
    Rule::codes(Category::District, &[301, 503], "р-н"),
    Rule::codes(Category::Masculine, &[639, 707, 9107], "кв-л"),
    Rule::codes(Category::Masculine, &[719, 9119], "пр-кт"),
    Rule::codes(Category::Masculine, &[718, 9118], "проезд"),
    Rule::codes(Category::Masculine, &[714, 9114], "пер"),
    Rule::codes(Category::Feminine { square: false }, &[710, 9110], "линия"),
    Rule::codes(Category::Feminine { square: true }, &[716, 9116], "пл"),
    Rule::codes(Category::Street, &[729, 9129], "ул"),
];

/// Select the rule for a classifier code and level, if any
pub fn select(code: u32, level: u32) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.matches(code, level))
}

/// How a level-1 object is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionForm {
    Literal(&'static str),
    /// Formal name, then display form; requires the given short name
    FormalFirst { expected_short: &'static str },
    /// Full classifier word, then formal name
    WordFirst,
    /// Formal name, then full classifier word
    WordLast,
    Default,
}

const REGION_LITERALS: &[(&str, &str)] = &[
    ("21", "Чувашская Республика"),
    ("86", "Ханты-Мансийский АО"),
];

const WORD_FIRST_REGIONS: &[&str] = &[
    "01", "02", "03", "04", "05", "06", "08", "10", "11", "12", "13", "14", "15", "16", "17",
    "19", "91",
];

const WORD_LAST_REGIONS: &[&str] = &["07", "09", "18", "20"];

/// Region rules in priority order: Chuvashia literal, then
/// край/область/автономная область codes, then the Yugra literal, then
/// the two region-code groups.
pub fn region_form(region_code: &str, code: u32) -> RegionForm {
    if region_code == "21" {
        return RegionForm::Literal(REGION_LITERALS[0].1);
    }
    match code {
        104 => return RegionForm::FormalFirst { expected_short: "край" },
        105 => return RegionForm::FormalFirst { expected_short: "обл" },
        102 => return RegionForm::FormalFirst { expected_short: "Аобл" },
        _ => {}
    }
    if let Some((_, literal)) = REGION_LITERALS.iter().find(|(r, _)| *r == region_code) {
        return RegionForm::Literal(*literal);
    }
    if WORD_FIRST_REGIONS.contains(&region_code) {
        RegionForm::WordFirst
    } else if WORD_LAST_REGIONS.contains(&region_code) {
        RegionForm::WordLast
    } else {
        RegionForm::Default
    }
}
