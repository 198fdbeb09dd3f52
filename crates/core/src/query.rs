use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::model::{AggregateNode, MatchFlags};

/// What the user typed into the search box, plus the toggles next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchConfig {
    pub query: String,
    pub case_sensitive: bool,
    /// Use the query as a regular expression for the text match instead of
    /// a literal. Falls back to the literal when it does not compile.
    pub is_regex: bool,
}

impl SearchConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Unit suffix of a numeric query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryUnit {
    /// `%`: compare against the share of the tree total.
    Percent,
    /// `ms`: compare against raw times.
    Milliseconds,
    /// A trailing `s` that is not `ms`: seconds, converted to milliseconds.
    Seconds,
    /// No numeric comparison; text matching only.
    None,
}

/// A parsed search query.
///
/// Grammar, applied to the trimmed query:
///
/// * prefix `>` / `<` selects greater/less than; `=` as the first character,
///   or as the second right after `>` / `<`, adds equality;
/// * a bare number without `>` / `<` implies `=`;
/// * suffix `%` compares percentages, `ms` milliseconds, any other trailing
///   `s` seconds;
/// * the whole query is also matched as text against function name and url.
#[derive(Debug, Clone)]
pub struct Query {
    greater_than: bool,
    less_than: bool,
    equal_to: bool,
    unit: QueryUnit,
    number: f64,
    number_ms: f64,
    pattern: Option<Regex>,
}

impl Query {
    /// `None` for an empty or whitespace-only query.
    pub fn parse(config: &SearchConfig) -> Option<Self> {
        let query = config.query.trim();
        if query.is_empty() {
            return None;
        }

        let greater_than = query.starts_with('>');
        let less_than = query.starts_with('<');
        let mut equal_to =
            query.starts_with('=') || ((greater_than || less_than) && query.find('=') == Some(1));

        let unit = if query.ends_with('%') {
            QueryUnit::Percent
        } else if query.chars().count() > 2 && query.ends_with("ms") {
            QueryUnit::Milliseconds
        } else if query.ends_with('s') {
            QueryUnit::Seconds
        } else {
            QueryUnit::None
        };

        // Operator characters are ASCII, so byte offsets are char offsets here.
        let number = if equal_to && (greater_than || less_than) {
            parse_float(&query[2..])
        } else if greater_than || less_than || equal_to {
            parse_float(&query[1..])
        } else {
            parse_float(query)
        };
        let number_ms = if unit == QueryUnit::Seconds {
            number * 1000.0
        } else {
            number
        };

        if !number.is_nan() && !(greater_than || less_than) {
            equal_to = true;
        }

        Some(Self {
            greater_than,
            less_than,
            equal_to,
            unit,
            number,
            number_ms,
            pattern: text_pattern(query, config),
        })
    }

    pub fn unit(&self) -> QueryUnit {
        self.unit
    }

    /// Threshold as typed, before any seconds conversion. NaN when the query
    /// is not numeric.
    pub fn number(&self) -> f64 {
        self.number
    }

    /// Evaluate the query against one node. `tree_total` is the grand total
    /// percentages are computed from.
    pub fn matches(&self, node: &AggregateNode, tree_total: f64) -> MatchFlags {
        let mut flags = MatchFlags::NONE;

        let compared = match self.unit {
            QueryUnit::Percent => Some((
                node.self_time / tree_total * 100.0,
                node.total_time / tree_total * 100.0,
                self.number,
            )),
            QueryUnit::Milliseconds | QueryUnit::Seconds => {
                Some((node.self_time, node.total_time, self.number_ms))
            }
            QueryUnit::None => None,
        };

        if let Some((self_value, total_value, threshold)) = compared {
            if self.less_than {
                flags.self_column |= self_value < threshold;
                flags.total_column |= total_value < threshold;
            } else if self.greater_than {
                flags.self_column |= self_value > threshold;
                flags.total_column |= total_value > threshold;
            }
            if self.equal_to {
                flags.self_column |= self_value == threshold;
                flags.total_column |= total_value == threshold;
            }
        }

        if let Some(pattern) = &self.pattern {
            flags.function_column = pattern.is_match(&node.function_name)
                || (!node.url.is_empty() && pattern.is_match(&node.url));
        }

        flags
    }
}

fn text_pattern(query: &str, config: &SearchConfig) -> Option<Regex> {
    if config.is_regex {
        match RegexBuilder::new(query)
            .case_insensitive(!config.case_sensitive)
            .build()
        {
            Ok(regex) => return Some(regex),
            Err(err) => warn!(%err, query, "invalid search regex, matching it literally"),
        }
    }
    // Only fails on the compiled size limit, i.e. absurdly long queries.
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(!config.case_sensitive)
        .build()
        .map_err(|err| warn!(%err, "search query too large, text matching disabled"))
        .ok()
}

/// `parseFloat` semantics: leading whitespace is skipped, the longest
/// decimal prefix is parsed, anything that does not start like a number is
/// NaN.
pub(crate) fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            end = 1;
            true
        }
        Some(b'+') => {
            end = 1;
            false
        }
        _ => false,
    };
    if s[end..].starts_with("Infinity") {
        return if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let integer_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - integer_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        // "5." is a number, "." is not.
        if digits > 0 || fraction_end > fraction_start {
            digits += fraction_end - fraction_start;
            end = fraction_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent_end = end + 1;
        if exponent_end < bytes.len() && matches!(bytes[exponent_end], b'+' | b'-') {
            exponent_end += 1;
        }
        let exponent_digits = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits {
            end = exponent_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}
