//! Spreadsheet number display formats
//!
//! Renders a numeric cell value the way a spreadsheet shows it under a
//! format code such as `0.00`, `#,##0`, `0%`, `# ?/?` or `yyyy-mm-dd`.
//!
//! A code has up to four `;` separated sections: positive, negative, zero
//! and text. Colors, conditions and locale tags in brackets are ignored,
//! except that `[$sym-xxxx]` emits its currency symbol and `[h]`, `[mm]`,
//! `[ss]` render elapsed time. Serial dates use the 1900 date system,
//! including its phantom 1900-02-29.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// The format code spreadsheets use when none is set
pub const GENERAL: &str = "General";

const MS_PER_DAY: i64 = 86_400_000;
/// Serial number of 9999-12-31
const MAX_SERIAL: f64 = 2_958_465.0;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August",
    "September", "October", "November", "December",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    /// `0`, `#` or `?`
    Digit(char),
    DecimalPoint,
    Comma,
    Percent,
    Exponent { show_plus: bool },
    Slash,
    /// `@`
    Text,
    General,
    Year(usize),
    Month(usize),
    Day(usize),
    Hour(usize),
    Minute(usize),
    Second(usize),
    SubSecond(usize),
    AmPm { short: bool, lowercase: bool },
    Elapsed(ElapsedUnit, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElapsedUnit {
    Hours,
    Minutes,
    Seconds,
}

impl Token {
    fn is_date(&self) -> bool {
        matches!(
            self,
            Token::Year(_)
                | Token::Month(_)
                | Token::Day(_)
                | Token::Hour(_)
                | Token::Minute(_)
                | Token::Second(_)
                | Token::SubSecond(_)
                | Token::AmPm { .. }
                | Token::Elapsed(..)
        )
    }

    fn is_hour(&self) -> bool {
        matches!(self, Token::Hour(_) | Token::Elapsed(ElapsedUnit::Hours, _))
    }

    fn is_second(&self) -> bool {
        matches!(self, Token::Second(_) | Token::Elapsed(ElapsedUnit::Seconds, _))
    }
}

/// Standard code for a built-in number format id
pub fn builtin_format(id: u32) -> Option<&'static str> {
    let code = match id {
        0 => GENERAL,
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

/// Whether a format code displays its value as a date or time
pub fn is_date_format(code: &str) -> bool {
    split_sections(code)
        .first()
        .and_then(|section| tokenize(section))
        .is_some_and(|tokens| tokens.iter().any(Token::is_date))
}

/// Render `value` under the format `code`. A code that cannot be parsed
/// renders as General.
pub fn format_number(value: f64, code: &str) -> String {
    if !value.is_finite() || code.is_empty() || code.eq_ignore_ascii_case(GENERAL) {
        return format_general(value);
    }

    let sections: Option<Vec<Vec<Token>>> =
        split_sections(code).into_iter().map(tokenize).collect();
    let Some(sections) = sections else {
        return format_general(value);
    };

    let (tokens, magnitude, signed) = match sections.len() {
        1 => (&sections[0], value, true),
        _ if value < 0.0 => (&sections[1], value.abs(), false),
        n if value == 0.0 && n >= 3 => (&sections[2], 0.0, false),
        _ => (&sections[0], value, false),
    };

    if tokens.iter().any(Token::is_date) {
        return format_date(magnitude, tokens).unwrap_or_else(|| format_general(value));
    }

    let rendered = format_numeric(magnitude.abs(), tokens);
    if signed && value < 0.0 && rendered.chars().any(|c| ('1'..='9').contains(&c)) {
        format!("-{rendered}")
    } else {
        rendered
    }
}

/// General format: integers as is, other values in at most 11 characters
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    if !(1e-9..1e11).contains(&abs) {
        let scientific = format!("{:.5e}", abs);
        let (mantissa, exponent) = match scientific.split_once('e') {
            Some(parts) => parts,
            None => return scientific,
        };
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}E{exp_sign}{:02}", exponent.abs());
    }

    let int_digits = if abs < 1.0 { 1 } else { abs.log10().floor() as usize + 1 };
    let (int, frac) = round_digits(abs, 10usize.saturating_sub(int_digits));
    let int = if int.is_empty() { "0".to_string() } else { int };
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{sign}{int}")
    } else {
        format!("{sign}{int}.{frac}")
    }
}

fn split_sections(code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut in_bracket = false;
    let mut escaped = false;

    for (i, c) in code.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '"' if !in_bracket => in_quote = !in_quote,
            '\\' | '_' | '*' if !in_quote && !in_bracket => escaped = true,
            '[' if !in_quote => in_bracket = true,
            ']' if !in_quote => in_bracket = false,
            ';' if !in_quote && !in_bracket => {
                sections.push(&code[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&code[start..]);
    sections
}

fn starts_with_ignore_case(chars: &[char], word: &str) -> bool {
    chars.len() >= word.len()
        && chars
            .iter()
            .zip(word.chars())
            .all(|(a, b)| a.to_ascii_lowercase() == b)
}

/// Split one section into tokens. Returns `None` for an unterminated quote,
/// bracket or escape.
fn tokenize(section: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = section.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = chars[i + 1..].iter().position(|&c| c == '"')? + i + 1;
                tokens.push(Token::Literal(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            '\\' => {
                tokens.push(Token::Literal(chars.get(i + 1)?.to_string()));
                i += 2;
            }
            '_' => {
                chars.get(i + 1)?;
                tokens.push(Token::Literal(" ".to_string()));
                i += 2;
            }
            '*' => {
                chars.get(i + 1)?;
                i += 2;
            }
            '[' => {
                let end = chars[i + 1..].iter().position(|&c| c == ']')? + i + 1;
                let content: String = chars[i + 1..end].iter().collect();
                if let Some(token) = bracket_token(&content) {
                    tokens.push(token);
                }
                i = end + 1;
            }
            '0' | '#' | '?' => {
                tokens.push(Token::Digit(c));
                i += 1;
            }
            '.' => {
                tokens.push(Token::DecimalPoint);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '@' => {
                tokens.push(Token::Text);
                i += 1;
            }
            'E' | 'e' if matches!(chars.get(i + 1).copied(), Some('+') | Some('-')) => {
                tokens.push(Token::Exponent { show_plus: chars[i + 1] == '+' });
                i += 2;
            }
            'G' | 'g' if starts_with_ignore_case(&chars[i..], "general") => {
                tokens.push(Token::General);
                i += GENERAL.len();
            }
            'A' | 'a' if starts_with_ignore_case(&chars[i..], "am/pm") => {
                tokens.push(Token::AmPm { short: false, lowercase: c == 'a' });
                i += 5;
            }
            'A' | 'a' if starts_with_ignore_case(&chars[i..], "a/p") => {
                tokens.push(Token::AmPm { short: true, lowercase: c == 'a' });
                i += 3;
            }
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => {
                let lower = c.to_ascii_lowercase();
                let mut n = 0;
                while chars.get(i + n).is_some_and(|c| c.to_ascii_lowercase() == lower) {
                    n += 1;
                }
                tokens.push(match lower {
                    'y' => Token::Year(n),
                    'm' => Token::Month(n),
                    'd' => Token::Day(n),
                    'h' => Token::Hour(n),
                    _ => Token::Second(n),
                });
                i += n;
            }
            _ => {
                tokens.push(Token::Literal(c.to_string()));
                i += 1;
            }
        }
    }

    Some(resolve_date_tokens(tokens))
}

fn bracket_token(content: &str) -> Option<Token> {
    if let Some(currency) = content.strip_prefix('$') {
        let symbol = currency.split('-').next().unwrap_or_default();
        return (!symbol.is_empty()).then(|| Token::Literal(symbol.to_string()));
    }

    let lower = content.to_ascii_lowercase();
    let first = lower.chars().next()?;
    if !lower.chars().all(|c| c == first) {
        return None;
    }
    let unit = match first {
        'h' => ElapsedUnit::Hours,
        'm' => ElapsedUnit::Minutes,
        's' => ElapsedUnit::Seconds,
        _ => return None,
    };
    Some(Token::Elapsed(unit, lower.len()))
}

/// Turn `m` next to hours or seconds into minutes and `.0` after seconds
/// into fractional seconds
fn resolve_date_tokens(mut tokens: Vec<Token>) -> Vec<Token> {
    if !tokens.iter().any(Token::is_date) {
        return tokens;
    }

    for i in 0..tokens.len() {
        if let Token::Month(n) = tokens[i] {
            let after_hour = tokens[..i]
                .iter()
                .rev()
                .find(|t| t.is_date())
                .is_some_and(Token::is_hour);
            let before_second = tokens[i + 1..]
                .iter()
                .find(|t| t.is_date())
                .is_some_and(Token::is_second);
            if n <= 2 && (after_hour || before_second) {
                tokens[i] = Token::Minute(n);
            }
        }
    }

    let mut resolved = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token == Token::DecimalPoint && iter.peek() == Some(&Token::Digit('0')) {
            let mut n = 0;
            while iter.next_if_eq(&Token::Digit('0')).is_some() {
                n += 1;
            }
            resolved.push(Token::SubSecond(n));
        } else {
            resolved.push(token);
        }
    }
    resolved
}

/// Round to 15 significant digits, the precision spreadsheets display
fn round_significant(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    format!("{:.14e}", value).parse().unwrap_or(value)
}

/// Integer and fraction digits of `value` rounded half away from zero to
/// `places` decimals. The integer digits carry no leading zeros, so zero
/// has an empty integer part.
fn round_digits(value: f64, places: usize) -> (String, String) {
    let scaled = round_significant(value.abs() * 10f64.powi(places as i32)).round();
    if !scaled.is_finite() {
        return (format!("{:.0}", value.abs()), "0".repeat(places));
    }

    let digits = format!("{:.0}", scaled);
    let digits = format!("{:0>width$}", digits, width = places + 1);
    let (int, frac) = digits.split_at(digits.len() - places);
    (int.trim_start_matches('0').to_string(), frac.to_string())
}

fn format_numeric(value: f64, tokens: &[Token]) -> String {
    if tokens.iter().any(|t| matches!(t, Token::General | Token::Text)) {
        return tokens
            .iter()
            .map(|t| match t {
                Token::General | Token::Text => format_general(value),
                other => literal_text(other),
            })
            .collect();
    }

    if count_digits(tokens) == 0 {
        return tokens.iter().map(literal_text).collect();
    }

    let mut value = value;
    for _ in tokens.iter().filter(|t| **t == Token::Percent) {
        value *= 100.0;
    }

    let exponent_at = tokens.iter().position(|t| matches!(t, Token::Exponent { .. }));
    let number_end = exponent_at.unwrap_or(tokens.len());

    // Commas after the last digit placeholder scale by a thousand each
    let last_digit = tokens[..number_end]
        .iter()
        .rposition(|t| matches!(t, Token::Digit(_)));
    if let Some(last) = last_digit {
        let scaling = tokens[last + 1..number_end]
            .iter()
            .filter(|t| **t == Token::Comma)
            .count();
        value /= 1000f64.powi(scaling as i32);
    }

    let decimal_at = tokens[..number_end]
        .iter()
        .position(|t| *t == Token::DecimalPoint);

    if exponent_at.is_none() && decimal_at.is_none() {
        if let Some(slash) = fraction_bar(tokens) {
            return format_fraction(value, tokens, slash);
        }
    }

    let int_end = decimal_at.unwrap_or(number_end);
    let int_tokens = &tokens[..int_end];
    let frac_tokens: &[Token] = match decimal_at {
        Some(at) => &tokens[at + 1..number_end],
        None => &[],
    };
    let frac_places = count_digits(frac_tokens);

    let first_int_digit = int_tokens.iter().position(|t| matches!(t, Token::Digit(_)));
    let last_int_digit = int_tokens.iter().rposition(|t| matches!(t, Token::Digit(_)));
    let grouping = match (first_int_digit, last_int_digit) {
        (Some(first), Some(last)) => int_tokens[first..last].contains(&Token::Comma),
        _ => false,
    };

    let (mantissa, exponent) = match exponent_at {
        Some(_) => {
            let (mantissa, exponent) = scientific_parts(value, int_tokens, frac_places);
            (mantissa, Some(exponent))
        }
        None => (value, None),
    };
    let (int_digits, frac_digits) = round_digits(mantissa, frac_places);

    let mut out = render_integer(int_tokens, &int_digits, grouping);
    if decimal_at.is_some() {
        out.push('.');
        out.push_str(&render_fraction(frac_tokens, &frac_digits));
    }
    if let (Some(at), Some(exponent)) = (exponent_at, exponent) {
        out.push_str(&render_exponent(&tokens[at..], exponent));
    }
    out
}

fn count_digits(tokens: &[Token]) -> usize {
    tokens.iter().filter(|t| matches!(t, Token::Digit(_))).count()
}

/// Text of a token that is not a digit placeholder
fn literal_text(token: &Token) -> String {
    match token {
        Token::Literal(s) => s.clone(),
        Token::Percent => "%".to_string(),
        Token::Slash => "/".to_string(),
        Token::DecimalPoint => ".".to_string(),
        _ => String::new(),
    }
}

/// Mantissa and exponent for scientific notation. With only `0`
/// placeholders the mantissa keeps that many integer digits; otherwise the
/// exponent is a multiple of the placeholder count.
fn scientific_parts(value: f64, int_tokens: &[Token], frac_places: usize) -> (f64, i32) {
    if value == 0.0 {
        return (0.0, 0);
    }
    let int_places = count_digits(int_tokens).max(1) as i32;
    let engineering = int_tokens.contains(&Token::Digit('#'));

    let normalize = |magnitude: i32| {
        if engineering {
            magnitude - magnitude.rem_euclid(int_places)
        } else {
            magnitude - (int_places - 1)
        }
    };

    let mut exponent = normalize(value.log10().floor() as i32);
    let mut mantissa = value / 10f64.powi(exponent);

    // Rounding can carry into another integer digit, e.g. 9.999 -> 10.00
    let (int, _) = round_digits(mantissa, frac_places);
    if int.len() as i32 > int_places {
        exponent = normalize(exponent + int_places);
        mantissa = value / 10f64.powi(exponent);
    }
    (mantissa, exponent)
}

fn render_exponent(tokens: &[Token], exponent: i32) -> String {
    let show_plus = matches!(tokens.first(), Some(Token::Exponent { show_plus: true }));
    let width = tokens[1..]
        .iter()
        .filter(|t| **t == Token::Digit('0'))
        .count()
        .max(1);
    let sign = if exponent < 0 {
        "-"
    } else if show_plus {
        "+"
    } else {
        ""
    };
    format!("E{sign}{:0>width$}", exponent.abs(), width = width)
}

/// Render integer digits into the integer placeholders. Digits fill the
/// placeholders from the right; the leftmost placeholder takes any excess.
fn render_integer(tokens: &[Token], digits: &str, grouping: bool) -> String {
    let placeholders: Vec<(usize, char)> = tokens
        .iter()
        .enumerate()
        .filter_map(|(i, t)| match t {
            Token::Digit(c) => Some((i, *c)),
            _ => None,
        })
        .collect();

    if placeholders.is_empty() {
        let literals: String = tokens.iter().map(literal_text).collect();
        return format!("{literals}{digits}");
    }

    let digit_chars: Vec<char> = digits.chars().collect();
    let mut filled: Vec<String> = vec![String::new(); tokens.len()];
    let count = placeholders.len();
    for (k, (index, kind)) in placeholders.iter().rev().enumerate() {
        let mut text = if k < digit_chars.len() {
            digit_chars[digit_chars.len() - 1 - k].to_string()
        } else {
            match kind {
                '0' => "0".to_string(),
                '?' => " ".to_string(),
                _ => String::new(),
            }
        };
        if k == count - 1 && digit_chars.len() > count {
            let excess: String = digit_chars[..digit_chars.len() - count].iter().collect();
            text = excess + &text;
        }
        filled[*index] = text;
    }

    if !grouping {
        return tokens
            .iter()
            .zip(filled)
            .map(|(token, text)| match token {
                Token::Digit(_) => text,
                Token::Comma => String::new(),
                other => literal_text(other),
            })
            .collect();
    }

    let first = placeholders[0].0;
    let last = placeholders[count - 1].0;
    let number: String = filled[first..=last].concat();
    let prefix: String = tokens[..first].iter().map(literal_text).collect();
    let inner: String = tokens[first..=last]
        .iter()
        .filter(|t| !matches!(t, Token::Digit(_) | Token::Comma))
        .map(literal_text)
        .collect();
    let suffix: String = tokens[last + 1..].iter().map(literal_text).collect();
    format!("{prefix}{}{inner}{suffix}", group_thousands(&number))
}

fn group_thousands(number: &str) -> String {
    let digits: Vec<char> = number.chars().collect();
    let start = digits.iter().position(|c| c.is_ascii_digit()).unwrap_or(digits.len());
    let numeric = &digits[start..];
    let mut out: String = digits[..start].iter().collect();
    for (i, c) in numeric.iter().enumerate() {
        if i > 0 && (numeric.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

/// Render fraction digits into the placeholders after the decimal point.
/// Trailing zeros vanish under `#` and turn into spaces under `?`.
fn render_fraction(tokens: &[Token], digits: &str) -> String {
    let kinds: Vec<char> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Digit(c) => Some(*c),
            _ => None,
        })
        .collect();
    let mut rendered: Vec<String> = digits.chars().map(|c| c.to_string()).collect();

    for i in (0..rendered.len()).rev() {
        if rendered[i] != "0" {
            break;
        }
        match kinds.get(i).copied() {
            Some('#') => rendered[i].clear(),
            Some('?') => rendered[i] = " ".to_string(),
            _ => break,
        }
    }

    let mut digits = rendered.into_iter();
    tokens
        .iter()
        .map(|t| match t {
            Token::Digit(_) => digits.next().unwrap_or_default(),
            Token::Comma => String::new(),
            other => literal_text(other),
        })
        .collect()
}

/// Position of a `/` with digit placeholders before it
fn fraction_bar(tokens: &[Token]) -> Option<usize> {
    let slash = tokens.iter().position(|t| *t == Token::Slash)?;
    let before = matches!(tokens[..slash].last(), Some(Token::Digit(_)));
    before.then_some(slash)
}

fn format_fraction(value: f64, tokens: &[Token], slash: usize) -> String {
    // Numerator placeholders directly precede the bar; anything before them
    // is the whole-number part
    let numerator_start = tokens[..slash]
        .iter()
        .rposition(|t| !matches!(t, Token::Digit(_)))
        .map_or(0, |i| i + 1);
    let int_tokens = &tokens[..numerator_start];
    let numerator_tokens = &tokens[numerator_start..slash];
    let denominator_tokens = &tokens[slash + 1..];
    let has_whole = int_tokens.iter().any(|t| matches!(t, Token::Digit(_)));

    let fixed_denominator: Option<u64> = match denominator_tokens.first() {
        Some(Token::Literal(_)) => {
            let digits: String = denominator_tokens
                .iter()
                .map_while(|t| match t {
                    Token::Literal(s) if s.chars().all(|c| c.is_ascii_digit()) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            digits.parse().ok().filter(|d| *d > 0)
        }
        _ => None,
    };
    let denominator_places = denominator_tokens
        .iter()
        .take_while(|t| matches!(t, Token::Digit(_)))
        .count();

    let mut whole = if has_whole { value.trunc() } else { 0.0 };
    let fraction = value - whole;

    let (mut numerator, denominator) = match fixed_denominator {
        Some(den) => ((fraction * den as f64).round() as u64, den),
        None => {
            let max_den = 10u64.pow(denominator_places.max(1) as u32) - 1;
            best_fraction(fraction, max_den)
        }
    };
    if has_whole && numerator == denominator {
        whole += 1.0;
        numerator = 0;
    }

    let (whole_digits, _) = round_digits(whole, 0);
    if numerator == 0 {
        return if whole_digits.is_empty() {
            "0".to_string()
        } else {
            render_integer(int_tokens, &whole_digits, false).trim_end().to_string()
        };
    }

    let mut out = render_integer(int_tokens, &whole_digits, false);
    out.push_str(&render_integer(numerator_tokens, &numerator.to_string(), false));
    out.push('/');
    let den = denominator.to_string();
    out.push_str(&den);
    if fixed_denominator.is_none() {
        let pad = denominator_places.saturating_sub(den.len());
        out.push_str(&" ".repeat(pad));
    }
    out.push_str(
        &denominator_tokens
            .iter()
            .skip_while(|t| matches!(t, Token::Digit(_)))
            .filter(|t| !matches!(t, Token::Literal(s) if fixed_denominator.is_some() && s.chars().all(|c| c.is_ascii_digit())))
            .map(literal_text)
            .collect::<String>(),
    );
    out
}

/// Closest fraction to `value` (in `[0, 1]`) with a denominator up to `max_den`
fn best_fraction(value: f64, max_den: u64) -> (u64, u64) {
    let mut best = (0, 1);
    let mut best_error = f64::MAX;
    for den in 1..=max_den {
        let num = (value * den as f64).round();
        let error = (value - num / den as f64).abs();
        if error < best_error - f64::EPSILON {
            best = (num as u64, den);
            best_error = error;
        }
    }
    best
}

/// Calendar fields of a serial date-time
struct SerialDateTime {
    year: i32,
    month: u32,
    day: u32,
    weekday: Weekday,
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
    total_ms: i64,
}

impl SerialDateTime {
    fn from_serial(serial: f64, whole_seconds: bool) -> Option<Self> {
        if !(0.0..MAX_SERIAL + 1.0).contains(&serial) {
            return None;
        }
        let mut total_ms = (serial * MS_PER_DAY as f64).round() as i64;
        if whole_seconds {
            total_ms = (total_ms + 500) / 1000 * 1000;
        }
        let days = total_ms / MS_PER_DAY;
        let ms_of_day = total_ms % MS_PER_DAY;

        let (year, month, day, weekday) = if days == 60 {
            // 1900-02-29 exists in the 1900 date system
            (1900, 2, 29, Weekday::Wed)
        } else {
            let (base, offset) = if days < 60 {
                (NaiveDate::from_ymd_opt(1899, 12, 31)?, days)
            } else {
                (NaiveDate::from_ymd_opt(1899, 12, 30)?, days)
            };
            let date = base.checked_add_days(Days::new(offset as u64))?;
            (date.year(), date.month(), date.day(), date.weekday())
        };

        Some(Self {
            year,
            month,
            day,
            weekday,
            hour: (ms_of_day / 3_600_000) as u32,
            minute: (ms_of_day / 60_000 % 60) as u32,
            second: (ms_of_day / 1000 % 60) as u32,
            millis: (ms_of_day % 1000) as u32,
            total_ms,
        })
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn format_date(serial: f64, tokens: &[Token]) -> Option<String> {
    let precise = tokens.iter().any(|t| matches!(t, Token::SubSecond(_)));
    let dt = SerialDateTime::from_serial(serial, !precise)?;
    let twelve_hour = tokens.iter().any(|t| matches!(t, Token::AmPm { .. }));
    let month_name = MONTH_NAMES[(dt.month - 1) as usize];
    let day_name = weekday_name(dt.weekday);

    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Year(n) if *n <= 2 => out.push_str(&format!("{:02}", dt.year % 100)),
            Token::Year(_) => out.push_str(&format!("{:04}", dt.year)),
            Token::Month(1) => out.push_str(&dt.month.to_string()),
            Token::Month(2) => out.push_str(&format!("{:02}", dt.month)),
            Token::Month(3) => out.push_str(&month_name[..3]),
            Token::Month(4) => out.push_str(month_name),
            Token::Month(_) => out.push_str(&month_name[..1]),
            Token::Day(1) => out.push_str(&dt.day.to_string()),
            Token::Day(2) => out.push_str(&format!("{:02}", dt.day)),
            Token::Day(3) => out.push_str(&day_name[..3]),
            Token::Day(_) => out.push_str(day_name),
            Token::Hour(n) => {
                let hour = if twelve_hour {
                    match dt.hour % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    dt.hour
                };
                out.push_str(&pad(hour as i64, *n));
            }
            Token::Minute(n) => out.push_str(&pad(dt.minute as i64, *n)),
            Token::Second(n) => out.push_str(&pad(dt.second as i64, *n)),
            Token::SubSecond(n) => {
                let millis = format!("{:03}", dt.millis);
                out.push('.');
                out.push_str(&millis[..(*n).min(3)]);
            }
            Token::AmPm { short, lowercase } => {
                let marker = match (dt.hour < 12, short) {
                    (true, false) => "AM",
                    (false, false) => "PM",
                    (true, true) => "A",
                    (false, true) => "P",
                };
                if *lowercase {
                    out.push_str(&marker.to_ascii_lowercase());
                } else {
                    out.push_str(marker);
                }
            }
            Token::Elapsed(unit, width) => {
                let total = match unit {
                    ElapsedUnit::Hours => dt.total_ms / 3_600_000,
                    ElapsedUnit::Minutes => dt.total_ms / 60_000,
                    ElapsedUnit::Seconds => dt.total_ms / 1000,
                };
                out.push_str(&pad(total, *width));
            }
            Token::Digit(c) => out.push(*c),
            Token::Comma => out.push(','),
            other => out.push_str(&literal_text(other)),
        }
    }
    Some(out)
}

fn pad(value: i64, width: usize) -> String {
    if width >= 2 {
        format!("{:02}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general() {
        assert_eq!(format_number(3.0, GENERAL), "3");
        assert_eq!(format_number(3.5, GENERAL), "3.5");
        assert_eq!(format_number(-42.0, "general"), "-42");
        assert_eq!(format_number(1.0 / 3.0, GENERAL), "0.333333333");
        assert_eq!(format_number(123456789012.0, GENERAL), "1.23457E+11");
        assert_eq!(format_number(0.1 + 0.2, GENERAL), "0.3");
    }

    #[test]
    fn test_fixed_decimals() {
        assert_eq!(format_number(3.0, "0.00"), "3.00");
        assert_eq!(format_number(2.675, "0.00"), "2.68");
        assert_eq!(format_number(0.5, "0"), "1");
        assert_eq!(format_number(-3.0, "0.00"), "-3.00");
        assert_eq!(format_number(-0.001, "0.00"), "0.00");
        assert_eq!(format_number(12.5, ".00"), "12.50");
    }

    #[test]
    fn test_optional_digits() {
        assert_eq!(format_number(0.5, "#.##"), ".5");
        assert_eq!(format_number(1.5, "0.0#"), "1.5");
        assert_eq!(format_number(1.234, "0.0#"), "1.23");
        assert_eq!(format_number(1.5, "0.???"), "1.5  ");
    }

    #[test]
    fn test_thousands() {
        assert_eq!(format_number(1234567.0, "#,##0"), "1,234,567");
        assert_eq!(format_number(1234.5, "#,##0.00"), "1,234.50");
        assert_eq!(format_number(0.0, "#,##0"), "0");
        assert_eq!(format_number(999.0, "#,##0"), "999");
        assert_eq!(format_number(1234567.0, "#,##0,"), "1,235");
        assert_eq!(format_number(1500000.0, "0.0,,\"M\""), "1.5M");
    }

    #[test]
    fn test_percent() {
        assert_eq!(format_number(0.25, "0%"), "25%");
        assert_eq!(format_number(0.1234, "0.00%"), "12.34%");
    }

    #[test]
    fn test_scientific() {
        assert_eq!(format_number(12345.0, "0.00E+00"), "1.23E+04");
        assert_eq!(format_number(0.00012, "0.00E+00"), "1.20E-04");
        assert_eq!(format_number(99999.0, "0.00E+00"), "1.00E+05");
        assert_eq!(format_number(12345.0, "##0.0E+0"), "12.3E+3");
        assert_eq!(format_number(0.0, "0.00E+00"), "0.00E+00");
    }

    #[test]
    fn test_sections() {
        assert_eq!(format_number(-3.0, "0.00;(0.00)"), "(3.00)");
        assert_eq!(format_number(3.0, "0.00;(0.00)"), "3.00");
        assert_eq!(format_number(0.0, "0.00;(0.00);\"zero\""), "zero");
        assert_eq!(format_number(-1234.0, "#,##0 ;[Red](#,##0)"), "(1,234)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(format_number(1234.5, "#,##0.00 \"EUR\""), "1,234.50 EUR");
        assert_eq!(format_number(5.0, "[$$-409]#,##0.00"), "$5.00");
        assert_eq!(format_number(5.0, "\\$0"), "$5");
        assert_eq!(format_number(5.0, "0_)"), "5 ");
        assert_eq!(format_number(5.0, "**0"), "5");
        assert_eq!(format_number(123456789.0, "000-00-0000"), "123-45-6789");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(format_number(1.5, "# ?/?"), "1 1/2");
        assert_eq!(format_number(0.75, "# ?/?"), " 3/4");
        assert_eq!(format_number(2.0, "# ?/?"), "2");
        assert_eq!(format_number(0.3, "# ??/??"), "  3/10");
        assert_eq!(format_number(1.25, "?/4"), "5/4");
    }

    #[test]
    fn test_dates() {
        assert_eq!(format_number(45000.0, "yyyy-mm-dd"), "2023-03-15");
        assert_eq!(format_number(45000.0, "mm-dd-yy"), "03-15-23");
        assert_eq!(format_number(45000.0, "d-mmm-yy"), "15-Mar-23");
        assert_eq!(format_number(45000.0, "dddd, mmmm d"), "Wednesday, March 15");
        assert_eq!(format_number(60.0, "yyyy-mm-dd"), "1900-02-29");
        assert_eq!(format_number(59.0, "yyyy-mm-dd"), "1900-02-28");
        assert_eq!(format_number(61.0, "yyyy-mm-dd"), "1900-03-01");
        assert_eq!(format_number(1.0, "yyyy-mm-dd"), "1900-01-01");
    }

    #[test]
    fn test_times() {
        assert_eq!(format_number(0.75, "h:mm AM/PM"), "6:00 PM");
        assert_eq!(format_number(0.25, "h:mm am/pm"), "6:00 am");
        assert_eq!(format_number(0.0, "h:mm AM/PM"), "12:00 AM");
        assert_eq!(format_number(0.5, "hh:mm:ss"), "12:00:00");
        assert_eq!(format_number(45000.5, "m/d/yy h:mm"), "3/15/23 12:00");
        assert_eq!(format_number(1.5, "[h]:mm:ss"), "36:00:00");
        assert_eq!(format_number(0.000_011_574, "mm:ss.0"), "00:01.0");
    }

    #[test]
    fn test_negative_date_falls_back() {
        assert_eq!(format_number(-1.0, "yyyy-mm-dd"), "-1");
    }

    #[test]
    fn test_is_date_format() {
        assert!(is_date_format("yyyy-mm-dd"));
        assert!(is_date_format("h:mm AM/PM"));
        assert!(is_date_format("[h]:mm:ss"));
        assert!(is_date_format("[$-409]mmmm d, yyyy"));
        assert!(!is_date_format("0.00"));
        assert!(!is_date_format("#,##0 \"days\""));
        assert!(!is_date_format(GENERAL));
    }

    #[test]
    fn test_builtin_formats() {
        assert_eq!(builtin_format(0), Some(GENERAL));
        assert_eq!(builtin_format(2), Some("0.00"));
        assert_eq!(builtin_format(14), Some("mm-dd-yy"));
        assert_eq!(builtin_format(5), None);
        assert!(builtin_format(49).is_some());
    }

    #[test]
    fn test_text_placeholder() {
        assert_eq!(format_number(3.5, "@"), "3.5");
        assert_eq!(format_number(3.0, "General\" units\""), "3 units");
    }

    #[test]
    fn test_unparseable_code_falls_back_to_general() {
        assert_eq!(format_number(3.5, "0.00\"unterminated"), "3.5");
        assert_eq!(format_number(3.5, "[Red"), "3.5");
    }
}
