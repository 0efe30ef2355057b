use regex::{Captures, Regex};

use super::rules::{self, Category, RegionForm};
use crate::error::{Error, Result};
use crate::models::{AbbreviationEntry, AddressObject};

/// Label used when every naming input is blank
pub const UNNAMED: &str = "(без названия)";

/// Inputs of one naming decision
#[derive(Debug, Clone, Copy)]
pub struct NameInput<'a> {
    pub formal_name: &'a str,
    pub level: u32,
    pub region_code: &'a str,
    pub code: u32,
    /// Raw short name of the matched abbreviation (SCNAME)
    pub short_name: &'a str,
    /// Full classifier word (SOCRNAME)
    pub full_name: &'a str,
    pub display_form: &'a str,
}

impl<'a> NameInput<'a> {
    pub fn new(object: &'a AddressObject, abbreviation: &'a AbbreviationEntry) -> Self {
        Self {
            formal_name: object.formal_name(),
            level: object.level,
            region_code: object.region_code(),
            code: abbreviation.code,
            short_name: &abbreviation.short_name,
            full_name: &abbreviation.full_name,
            display_form: &abbreviation.display_form,
        }
    }
}

/// Result of composing one display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub name: String,
    pub category: Category,
    /// The matched rule expected a different short name; the default form was used
    pub degraded: bool,
}

struct Patterns {
    adjective: Regex,
    named_after: Regex,
    ordinal: Regex,
}

impl Patterns {
    fn compile(adjective: &str, ordinal: &str) -> Result<Self> {
        Ok(Self {
            adjective: compile(adjective)?,
            named_after: compile(r"^\s*(и|И)м\s+(?P<name>.*)\s*$")?,
            ordinal: compile(ordinal)?,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("naming pattern {}: {}", pattern, e)))
}

/// Rule engine producing canonical display names for address objects.
///
/// Deterministic and total: every input yields the same non-empty name.
pub struct NameComposer {
    masculine: Patterns,
    feminine: Patterns,
    square: Regex,
}

impl NameComposer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            masculine: Patterns::compile(
                r"^(?P<name>([^\s]+ский)|([^\s]+ный)|([^\s]+овый))\s*$",
                r"^(?P<first>(.*\s)|)(?P<num>\d+-й)(?P<last>(\s.*)|)$",
            )?,
            feminine: Patterns::compile(
                r"^(?P<name>([^\s]+ская)|([^\s]+ная))\s*$",
                r"^(?P<first>(.*\s)|)(?P<num>\d+-я)(?P<last>(\s.*)|)$",
            )?,
            square: compile(r"^\s*(?P<name>.*)\s+площадь\s*$")?,
        })
    }

    pub fn compose(&self, object: &AddressObject, abbreviation: &AbbreviationEntry) -> String {
        self.compose_input(&NameInput::new(object, abbreviation)).name
    }

    pub fn compose_input(&self, input: &NameInput<'_>) -> Composition {
        let Some(rule) = rules::select(input.code, input.level) else {
            return finish(default_name(input), Category::Default, false);
        };

        if let Some(expected) = rule.expected_short {
            if input.short_name != expected {
                return finish(default_name(input), rule.category, true);
            }
        }

        match rule.category {
            Category::AutonomousOkrug => finish(formal_first(input), rule.category, false),
            Category::City | Category::Street | Category::Default => {
                finish(default_name(input), rule.category, false)
            }
            Category::Region => self.region(input),
            Category::District | Category::Masculine => {
                finish(self.masculine(input), rule.category, false)
            }
            Category::Feminine { square } => {
                finish(self.feminine(input, square), rule.category, false)
            }
        }
    }

    fn region(&self, input: &NameInput<'_>) -> Composition {
        let name = match rules::region_form(input.region_code, input.code) {
            RegionForm::Literal(literal) => literal.to_string(),
            RegionForm::FormalFirst { expected_short } => {
                if input.short_name != expected_short {
                    return finish(default_name(input), Category::Region, true);
                }
                formal_first(input)
            }
            RegionForm::WordFirst => join(&[input.full_name, input.formal_name]),
            RegionForm::WordLast => join(&[input.formal_name, input.full_name]),
            RegionForm::Default => default_name(input),
        };
        finish(name, Category::Region, false)
    }

    fn masculine(&self, input: &NameInput<'_>) -> String {
        let formal = input.formal_name;
        let display = input.display_form;

        if let Some(caps) = self.masculine.adjective.captures(formal) {
            return join(&[group(&caps, "name"), display]);
        }
        if let Some(caps) = self.masculine.named_after.captures(formal) {
            return named_after(display, &caps);
        }
        if let Some(caps) = self.masculine.ordinal.captures(formal) {
            let (first, num, last) = ordinal_parts(&caps);
            return match (first.is_empty(), last.is_empty()) {
                // 2-й Степной проезд
                (true, false) => join(&[num, last, display]),
                // проезд Строителей 2-й
                (false, true) => join(&[num, display, first]),
                (true, true) => join(&[num, display]),
                (false, false) => default_name(input),
            };
        }
        default_name(input)
    }

    fn feminine(&self, input: &NameInput<'_>, square: bool) -> String {
        let formal = input.formal_name;
        let display = input.display_form;

        if let Some(caps) = self.feminine.adjective.captures(formal) {
            return join(&[group(&caps, "name"), display]);
        }
        if let Some(caps) = self.feminine.named_after.captures(formal) {
            return named_after(display, &caps);
        }
        if let Some(caps) = self.feminine.ordinal.captures(formal) {
            let (first, num, last) = ordinal_parts(&caps);
            return match (first.is_empty(), last.is_empty()) {
                // 2-я линия Строителей
                (true, false) => join(&[num, display, last]),
                (false, false) => default_name(input),
                // Южная поляна 2-я линия, 3-я линия
                _ => join(&[formal, display]),
            };
        }
        if square {
            if let Some(caps) = self.square.captures(formal) {
                return join(&[group(&caps, "name"), display]);
            }
        }
        default_name(input)
    }
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

fn ordinal_parts<'t>(caps: &Captures<'t>) -> (&'t str, &'t str, &'t str) {
    (
        group(caps, "first").trim(),
        group(caps, "num"),
        group(caps, "last").trim(),
    )
}

fn named_after(display: &str, caps: &Captures<'_>) -> String {
    format!("{} им. {}", display, group(caps, "name")).trim().to_string()
}

/// Space-joined non-empty parts
fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_name(input: &NameInput<'_>) -> String {
    join(&[input.display_form, input.formal_name])
}

fn formal_first(input: &NameInput<'_>) -> String {
    join(&[input.formal_name, input.display_form])
}

fn finish(name: String, category: Category, degraded: bool) -> Composition {
    let name = if name.is_empty() {
        UNNAMED.to_string()
    } else {
        name
    };
    Composition {
        name,
        category,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        formal_name: &'a str,
        level: u32,
        code: u32,
        short_name: &'a str,
        display_form: &'a str,
    ) -> NameInput<'a> {
        NameInput {
            formal_name,
            level,
            region_code: "50",
            code,
            short_name,
            full_name: "",
            display_form,
        }
    }

    fn compose(input: NameInput<'_>) -> String {
        NameComposer::new().unwrap().compose_input(&input).name
    }

    #[test]
    fn test_ordinal_with_leading_text() {
        let name = compose(input("Строителей 2-й", 7, 718, "проезд", "пр."));
        assert_eq!(name, "2-й пр. Строителей");
    }

    #[test]
    fn test_ordinal_with_trailing_text() {
        let name = compose(input("2-й Степной", 7, 718, "проезд", "проезд"));
        assert_eq!(name, "2-й Степной проезд");
    }

    #[test]
    fn test_bare_ordinal() {
        assert_eq!(compose(input("3-й", 7, 714, "пер", "пер.")), "3-й пер.");
    }

    #[test]
    fn test_masculine_adjective() {
        assert_eq!(
            compose(input("Кутузовский", 7, 719, "пр-кт", "пр-кт")),
            "Кутузовский пр-кт"
        );
        assert_eq!(
            compose(input("Почтовый", 7, 714, "пер", "пер.")),
            "Почтовый пер."
        );
    }

    #[test]
    fn test_named_after() {
        assert_eq!(
            compose(input("им 50-летия Октября", 7, 707, "кв-л", "кв-л")),
            "кв-л им. 50-летия Октября"
        );
    }

    #[test]
    fn test_masculine_fallback() {
        assert_eq!(
            compose(input("Мира", 7, 719, "пр-кт", "пр-кт")),
            "пр-кт Мира"
        );
    }

    #[test]
    fn test_square() {
        let name = compose(input("Центральная площадь", 7, 716, "пл", "пл."));
        assert_eq!(name, "Центральная пл.");
    }

    #[test]
    fn test_square_pattern_needs_square_code() {
        let name = compose(input("Вокзальная площадь", 7, 710, "линия", "линия"));
        assert_eq!(name, "линия Вокзальная площадь");
    }

    #[test]
    fn test_feminine_forms() {
        assert_eq!(
            compose(input("Красная", 7, 716, "пл", "пл.")),
            "Красная пл."
        );
        assert_eq!(
            compose(input("2-я Строителей", 7, 710, "линия", "линия")),
            "2-я линия Строителей"
        );
        assert_eq!(
            compose(input("Южная поляна 2-я", 7, 710, "линия", "линия")),
            "Южная поляна 2-я линия"
        );
        assert_eq!(compose(input("3-я", 7, 710, "линия", "линия")), "3-я линия");
    }

    #[test]
    fn test_region_literal_ignores_feed_name() {
        let mut chuvashia = input("Чувашская Республика - Чувашия", 1, 106, "Чувашия", "респ.");
        chuvashia.region_code = "21";
        assert_eq!(compose(chuvashia), "Чувашская Республика");
        chuvashia.formal_name = "";
        assert_eq!(compose(chuvashia), "Чувашская Республика");
    }

    #[test]
    fn test_region_word_order() {
        let mut tatarstan = input("Татарстан", 1, 106, "Респ", "респ.");
        tatarstan.region_code = "16";
        tatarstan.full_name = "Республика";
        assert_eq!(compose(tatarstan), "Республика Татарстан");

        let mut chechnya = input("Чеченская", 1, 106, "Респ", "респ.");
        chechnya.region_code = "20";
        chechnya.full_name = "Республика";
        assert_eq!(compose(chechnya), "Чеченская Республика");

        let mut moscow = input("Московская", 1, 105, "обл", "обл.");
        moscow.region_code = "50";
        assert_eq!(compose(moscow), "Московская обл.");
    }

    #[test]
    fn test_city_and_district() {
        assert_eq!(compose(input("Казань", 4, 401, "г", "г.")), "г. Казань");
        assert_eq!(
            compose(input("Зеленодольский", 3, 301, "р-н", "р-н")),
            "Зеленодольский р-н"
        );
        assert_eq!(
            compose(input("Ненецкий", 1, 101, "АО", "АО")),
            "Ненецкий АО"
        );
    }

    #[test]
    fn test_unexpected_short_name_degrades() {
        let composition = NameComposer::new()
            .unwrap()
            .compose_input(&input("Строителей 2-й", 7, 718, "пр", "пр."));
        assert!(composition.degraded);
        assert_eq!(composition.name, "пр. Строителей 2-й");
    }

    #[test]
    fn test_total_and_deterministic() {
        let composer = NameComposer::new().unwrap();
        let empty = input("", 99, 0, "", "");
        let first = composer.compose_input(&empty);
        assert_eq!(first.name, UNNAMED);
        assert_eq!(first, composer.compose_input(&empty));

        let unknown = input("Лесная", 7, 9999, "аллея", "аллея");
        assert_eq!(composer.compose_input(&unknown).name, "аллея Лесная");
        assert_eq!(
            composer.compose_input(&unknown),
            composer.compose_input(&unknown)
        );
    }

    #[test]
    fn test_district_takes_masculine_forms() {
        let district = |name| compose(input(name, 3, 301, "р-н", "р-н"));
        assert_eq!(district("Лаишевский"), "Лаишевский р-н");
        assert_eq!(district("Мира"), "р-н Мира");
        assert_eq!(district("им Ленина"), "р-н им. Ленина");
        assert_eq!(district("Строителей 2-й"), "2-й р-н Строителей");
    }
}
