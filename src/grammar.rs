//! Token patterns shared by the three message parsers.
//!
//! The patterns are precompiled and named; the message parsers never build
//! ad-hoc ones. Group numbering is load-bearing where a pattern is used for
//! captures (positional fields, date operators, values), so the shapes stay
//! close to the grammar in the SHEF manual.

use once_cell::sync::Lazy;
use regex::Regex;

/// Start of any message: `.A`, `.E` or `.B`, optionally revised.
pub(crate) static MSG_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\.[ABE]R?\s").unwrap());

static CONT_A: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\.A\d{1,2}").unwrap());
static CONT_AR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\.AR?\d{1,2}").unwrap());
static CONT_E: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\.E\d{1,2}").unwrap());
static CONT_ER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\.ER?\d{1,2}").unwrap());
static CONT_B: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\.B\d{1,2}").unwrap());
static CONT_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\.BR?\d{1,2}").unwrap());

/// Continuation-line pattern for a message type; the revised variants also
/// accept the unrevised spelling.
pub(crate) fn continuation_pattern(message_type: char, revised: bool) -> &'static Regex {
    match (message_type.to_ascii_uppercase(), revised) {
        ('A', false) => &CONT_A,
        ('A', true) => &CONT_AR,
        ('E', false) => &CONT_E,
        ('E', true) => &CONT_ER,
        ('B', false) => &CONT_B,
        _ => &CONT_BR,
    }
}

/// Positional header fields.
/// Capture 1 = location, 2 = date, 6 = time zone.
pub(crate) static POSITIONAL_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^\.[AEB]R?\s+(\w{3,8})\s+((\d{2})?(\d{2})?\d{4})(\s+([NAECMPYLHB][DS]?|[JZ]))?[^\S\n]*",
    )
    .unwrap()
});

/// The `.B` header block: the opening line plus numbered continuations.
pub(crate) static DOT_B_HEADER_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\.BR?\s.+?$(?:\n^\.BR?\d\s.+?$)*").unwrap());

/// A `.B` body line: location then at least one field.
pub(crate) static DOT_B_BODY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w{3,8})\s+\S+.*$").unwrap());

/// A single absolute or relative date operator, anchored.
/// Capture 1 = operator, 2 = digits.
pub(crate) static OBS_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(D[SNHDMYJT]|DR[SNHDMYE][+-]?)(\d+)").unwrap());

/// Adjacent date operators separated by `/` or whitespace, to be glued with
/// `@`. Capture 1 = first operator+digits, 6/7 = the following one.
pub(crate) static MULTIPLE_OBS_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)((D[SNHDMYJT]|DR[SNHDMYE][+-]?)(\d+))((\s+|/)(D[SNHDMYJT]|DR[SNHDMYE][+-])(\d+))+?",
    )
    .unwrap()
});

/// A date-operator chain after gluing. Capture 1 = first operator+value.
pub(crate) static OBS_TIME_CHAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)((D[SNHDMYJT]|DR[SNHDMYE])([+-]?\d+))(@(D[SNHDMYJT]|DR[SNHDMYE])([+-]?\d+))*?")
        .unwrap()
});

static OBS_TIME_CHAIN_AT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^((D[SNHDMYJT]|DR[SNHDMYE])([+-]?\d+))(@(D[SNHDMYJT]|DR[SNHDMYE])([+-]?\d+))*?")
        .unwrap()
});

static CREATE_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^DC\d+").unwrap());

static UNIT_SYSTEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^DU[ES]").unwrap());

static DATA_QUALIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^DQ.").unwrap());

static DURATION_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(DV[SNHDMY]\d{1,2}|DVZ)").unwrap());

static INTERVAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^DI[SNHDMEY][+-]?\d{1,2}").unwrap());

/// A partial or full parameter code (the first letter can never be D, J, K,
/// O or Z, which keeps parameter tokens distinct from date operators).
pub(crate) static PARAMETER_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-CE-IL-NP-Y][A-Z](([A-Z]([A-Z0-9]{2})?[A-Z]{1,2})?)?").unwrap()
});

/// A data value with optional trailing qualifier.
/// Capture 2 = numeric, 3 = trace, 4 = missing, 5 = qualifier.
pub(crate) static VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(([+-]?(?:\d+(?:\.\d*)?|\.\d+))|(T+)|([M.+-]+|\+{1,2}))([A-Z]?)$").unwrap()
});

/// A retained comment: from a quote to the matching last quote, or to the
/// end of the field when unterminated.
pub(crate) static RETAINED_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"("(?:.*"|.+$)|'(?:.*'|.+$))"#).unwrap());

/// Leading/trailing separator residue on a token after the whitespace swap.
pub(crate) static REPLACEMENT_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[\u{0}\u{9}]+|[\u{0}\u{9}]+$").unwrap());

/// Sub-token separators within a slash-delimited token.
pub(crate) static REPLACEMENT_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{0}\u{9}]").unwrap());

pub(crate) fn is_obs_time(token: &str) -> bool {
    OBS_TIME.is_match(token)
}

pub(crate) fn is_obs_time_chain(token: &str) -> bool {
    OBS_TIME_CHAIN_AT_START.is_match(token)
}

pub(crate) fn is_create_time(token: &str) -> bool {
    CREATE_TIME.is_match(token)
}

pub(crate) fn is_unit_system(token: &str) -> bool {
    UNIT_SYSTEM.is_match(token)
}

pub(crate) fn is_data_qualifier(token: &str) -> bool {
    DATA_QUALIFIER.is_match(token)
}

pub(crate) fn is_duration_variable(token: &str) -> bool {
    DURATION_VARIABLE.is_match(token)
}

pub(crate) fn is_interval(token: &str) -> bool {
    INTERVAL.is_match(token)
}

pub(crate) fn is_parameter_code(token: &str) -> bool {
    PARAMETER_CODE.is_match(token)
}

pub(crate) fn is_value(token: &str) -> bool {
    VALUE.is_match(token)
}

/// Replace whitespace inside quotes with NUL/SOH so the field can survive
/// whitespace-driven splitting. Reversed by [unhide_quoted_whitespace].
pub(crate) fn hide_quoted_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    for c in s.chars() {
        if let Some(q) = quote {
            match c {
                ' ' => out.push('\u{0}'),
                '\t' => out.push('\u{1}'),
                _ => out.push(c),
            }
            if c == q {
                quote = None;
            }
        } else {
            out.push(c);
            if c == '\'' || c == '"' {
                quote = Some(c);
            }
        }
    }
    out
}

pub(crate) fn unhide_quoted_whitespace(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0}' => ' ',
            '\u{1}' => '\t',
            other => other,
        })
        .collect()
}

/// Swap hidden and real whitespace in one pass: NUL <-> space, SOH <-> tab.
/// After collapsing separator whitespace this turns the separators into
/// NULs and restores the protected comment text.
pub(crate) fn swap_hidden_whitespace(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0}' => ' ',
            '\u{1}' => '\t',
            ' ' => '\u{0}',
            '\t' => '\u{1}',
            other => other,
        })
        .collect()
}

/// Glue adjacent date operators with `@` so single-slash splitting cannot
/// fragment them.
pub(crate) fn glue_date_operators(data: &str) -> String {
    let mut data = data.to_string();
    while MULTIPLE_OBS_TIME.is_match(&data) {
        data = MULTIPLE_OBS_TIME
            .replace(&data, "${1}@${6}${7}")
            .into_owned();
    }
    data
}
