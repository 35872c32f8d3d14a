//! Filtro de vagas: piso salarial e menção a patrocínio de visto.

use crate::collaborators::JobPosting;
use crate::params::ApplicationParameters;

/// Phrases that indicate the employer sponsors work visas.
const SPONSORSHIP_PHRASES: &[&str] = &[
    "visa sponsorship",
    "sponsorship available",
    "sponsorship provided",
    "will sponsor",
    "sponsor visa",
    "h-1b",
    "h1b",
    "h1-b",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '\u{20ac}', '\u{a3}', '\u{a5}'];

/// Units after a bare number that mark it as a count rather than pay.
const NON_MONEY_UNITS: &[&str] = &[
    "hour", "hours", "hr", "hrs", "day", "days", "week", "weeks", "month", "months", "year",
    "years", "yr", "yrs",
];

const HOURS_PER_YEAR: f64 = 2080.0;
const MONTHS_PER_YEAR: f64 = 12.0;

/// Conjunctive posting criteria extracted from the run parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostingFilter {
    pub min_salary: Option<u64>,
    pub requires_sponsorship: bool,
}

impl PostingFilter {
    pub fn from_parameters(params: &ApplicationParameters) -> Self {
        Self {
            // A zero floor is the same as no floor.
            min_salary: params.min_salary.filter(|floor| *floor > 0),
            requires_sponsorship: params.requires_sponsorship,
        }
    }

    /// Whether the posting satisfies every configured criterion.
    ///
    /// A salary that cannot be parsed never satisfies a minimum.
    pub fn matches(&self, posting: &JobPosting) -> bool {
        if let Some(floor) = self.min_salary {
            let meets = posting
                .salary
                .as_deref()
                .and_then(parse_salary_floor)
                .is_some_and(|lower| lower >= floor);
            if !meets {
                return false;
            }
        }

        if self.requires_sponsorship && !mentions_sponsorship(&posting.description) {
            return false;
        }

        true
    }
}

pub fn matches(posting: &JobPosting, params: &ApplicationParameters) -> bool {
    PostingFilter::from_parameters(params).matches(posting)
}

/// Best-effort annual lower bound of a free-text salary.
///
/// Handles currency symbols, thousands separators, `k`/`m` suffixes, ranges
/// (the first amount is the floor) and hourly or monthly figures. Bare counts
/// of time or percentages ("40 hours/week", "10% bonus") are not amounts.
pub fn parse_salary_floor(text: &str) -> Option<u64> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let amounts = scan_amounts(&chars);
    let first = amounts.first()?;
    let range_end = amounts
        .get(1)
        .filter(|second| is_range_gap(&chars[first.end..second.start]));

    // "90-110k": the trailing suffix applies to the bare lower amount too.
    let multiplier = match (first.multiplier, range_end) {
        (
            None,
            Some(Amount {
                multiplier: Some(trailing),
                ..
            }),
        ) if first.value < 1000.0 => *trailing,
        (multiplier, _) => multiplier.unwrap_or(1.0),
    };

    // Only the unit written right after the figure (or the range) counts.
    let tail: String = chars[range_end.unwrap_or(first).end..].iter().collect();
    let annual = first.value * multiplier * period_factor(&tail);
    Some(annual.round() as u64)
}

pub fn mentions_sponsorship(description: &str) -> bool {
    let lower = description.to_lowercase();
    SPONSORSHIP_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[derive(Debug, Clone, Copy)]
struct Amount {
    value: f64,
    multiplier: Option<f64>,
    start: usize,
    end: usize,
}

fn period_factor(tail: &str) -> f64 {
    let tail = tail.trim_start();
    if tail.starts_with("hourly") {
        return HOURS_PER_YEAR;
    }
    if tail.starts_with("monthly") {
        return MONTHS_PER_YEAR;
    }

    let Some(unit) = ["/", "per ", "an ", "a "]
        .iter()
        .find_map(|prefix| tail.strip_prefix(prefix))
    else {
        return 1.0;
    };
    let word: String = unit
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();
    match word.as_str() {
        "hour" | "hours" | "hr" | "hrs" | "h" => HOURS_PER_YEAR,
        "month" | "months" | "mo" | "mos" => MONTHS_PER_YEAR,
        _ => 1.0,
    }
}

// Only a dash or "to" (plus spacing and currency symbols) joins two amounts.
fn is_range_gap(gap: &[char]) -> bool {
    let joiner: String = gap
        .iter()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(*c))
        .collect();
    matches!(joiner.as_str(), "-" | "\u{2013}" | "\u{2014}" | "to")
}

fn has_currency(chars: &[char], start: usize) -> bool {
    chars[..start]
        .iter()
        .rev()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| CURRENCY_SYMBOLS.contains(c))
}

fn counts_something_else(rest: &[char]) -> bool {
    let rest: String = rest
        .iter()
        .skip_while(|c| c.is_whitespace() || **c == '+')
        .collect();
    if rest.starts_with('%') {
        return true;
    }
    let word: String = rest.chars().take_while(|c| c.is_alphabetic()).collect();
    NON_MONEY_UNITS.contains(&word.as_str())
}

// Returns at most two salary amounts in order of appearance.
fn scan_amounts(chars: &[char]) -> Vec<Amount> {
    let digit_at = |idx: usize| chars.get(idx).is_some_and(|c| c.is_ascii_digit());
    let letter_at = |idx: usize| chars.get(idx).is_some_and(|c| c.is_alphabetic());

    let mut amounts = Vec::new();
    let mut i = 0;
    while i < chars.len() && amounts.len() < 2 {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        let mut number = String::new();
        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_digit() {
                number.push(c);
            } else if c == ',' && digit_at(i + 1) {
                // thousands separator
            } else if c == '.' && digit_at(i + 1) && !number.contains('.') {
                number.push('.');
            } else {
                break;
            }
            i += 1;
        }

        let mut j = i;
        while chars.get(j) == Some(&' ') {
            j += 1;
        }
        let suffix = match chars.get(j) {
            Some('k') if !letter_at(j + 1) => Some(1_000.0),
            Some('m') if !letter_at(j + 1) => Some(1_000_000.0),
            _ => None,
        };
        if suffix.is_some() {
            i = j + 1;
        }

        let Ok(value) = number.parse::<f64>() else {
            continue;
        };
        if suffix.is_none() && !has_currency(chars, start) && counts_something_else(&chars[i..]) {
            continue;
        }
        amounts.push(Amount {
            value,
            multiplier: suffix,
            start,
            end: i,
        });
    }
    amounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SearchCriteria;

    fn posting(salary: Option<&str>, description: &str) -> JobPosting {
        JobPosting {
            id: "job-1".into(),
            title: "Backend Engineer".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            salary: salary.map(str::to_string),
            url: "https://jobs.test/1".into(),
            description: description.into(),
        }
    }

    fn params(min_salary: Option<u64>, requires_sponsorship: bool) -> ApplicationParameters {
        let mut p = ApplicationParameters::new(
            SearchCriteria {
                keywords: "backend".into(),
                ..Default::default()
            },
            "cv",
        );
        p.min_salary = min_salary;
        p.requires_sponsorship = requires_sponsorship;
        p
    }

    #[test]
    fn salary_formats() {
        assert_eq!(parse_salary_floor("$120,000/year"), Some(120_000));
        assert_eq!(parse_salary_floor("$90k - $110k"), Some(90_000));
        assert_eq!(parse_salary_floor("90-110K"), Some(90_000));
        assert_eq!(parse_salary_floor("€130k"), Some(130_000));
        assert_eq!(parse_salary_floor("$1.2M"), Some(1_200_000));
        assert_eq!(parse_salary_floor("$65/hr"), Some(135_200));
        assert_eq!(parse_salary_floor("$50 per hour"), Some(104_000));
        assert_eq!(parse_salary_floor("$9,000 a month"), Some(108_000));
        assert_eq!(parse_salary_floor("$150,000 - $180,000"), Some(150_000));
    }

    #[test]
    fn period_comes_from_the_unit_next_to_the_amount() {
        assert_eq!(parse_salary_floor("40 hours/week, $120,000"), Some(120_000));
        assert_eq!(parse_salary_floor("5+ years experience, $95k - $120k"), Some(95_000));
        assert_eq!(parse_salary_floor("$40 - $50 per hour"), Some(83_200));
        assert_eq!(parse_salary_floor("$60 hourly"), Some(124_800));
        assert_eq!(parse_salary_floor("$110,000 + 10% bonus paid monthly"), Some(110_000));
        assert_eq!(parse_salary_floor("$90k to $110k"), Some(90_000));
        assert_eq!(parse_salary_floor("40 hours"), None);
    }

    #[test]
    fn unparseable_salary_yields_none() {
        assert_eq!(parse_salary_floor("Competitive"), None);
        assert_eq!(parse_salary_floor(""), None);
        assert_eq!(parse_salary_floor("DOE"), None);
    }

    #[test]
    fn range_below_floor_is_excluded_and_flat_above_is_included() {
        let p = params(Some(100_000), false);
        assert!(!matches(&posting(Some("$90k - $110k"), ""), &p));
        assert!(matches(&posting(Some("$120,000/year"), ""), &p));
    }

    #[test]
    fn missing_or_unparseable_salary_fails_closed() {
        let p = params(Some(100_000), false);
        assert!(!matches(&posting(None, ""), &p));
        assert!(!matches(&posting(Some("Competitive"), ""), &p));
    }

    #[test]
    fn zero_floor_means_no_salary_requirement() {
        let p = params(Some(0), false);
        assert!(matches(&posting(None, ""), &p));
    }

    #[test]
    fn sponsorship_scan_is_case_insensitive() {
        assert!(mentions_sponsorship("We offer VISA Sponsorship for this role"));
        assert!(mentions_sponsorship("H-1B transfers welcome"));
        assert!(!mentions_sponsorship("Must be authorized to work in the US"));
    }

    #[test]
    fn criteria_are_conjunctive() {
        let p = params(Some(100_000), true);
        assert!(!matches(&posting(Some("$120k"), "no mention"), &p));
        assert!(!matches(&posting(Some("$80k"), "visa sponsorship available"), &p));
        assert!(matches(&posting(Some("$120k"), "visa sponsorship available"), &p));
    }

    #[test]
    fn no_criteria_accepts_everything() {
        let p = params(None, false);
        assert!(matches(&posting(None, ""), &p));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let p = params(Some(100_000), true);
        let job = posting(Some("$105k - $130k"), "H1B sponsorship provided");
        let first = matches(&job, &p);
        for _ in 0..10 {
            assert_eq!(matches(&job, &p), first);
        }
        assert!(first);
    }
}
