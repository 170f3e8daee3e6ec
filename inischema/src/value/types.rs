// Built-in option types: scalar and list forms of int, short, float,
// string, and bool

use super::{OptionType, Parsed, Value};

/// Clip an input excerpt for diagnostics, like the original's `%.10s`.
fn clip(s: &str) -> &str {
    match s.char_indices().nth(10) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn prefix_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.find(|c| !pred(c)).unwrap_or(s.len())
}

fn digit_run(bytes: &[u8], from: usize) -> usize {
    bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Scan an integer prefix with `strtol(s, _, 0)` semantics: optional sign,
/// then hex with an `0x`/`0X` prefix, octal with a leading `0`, or decimal.
/// Consumes the longest valid prefix and returns the remainder; the
/// magnitude saturates, which the callers' range checks then reject.
fn scan_integer(s: &str) -> Option<(i128, &str)> {
    let t = s.trim_start();
    let (negative, t) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let bytes = t.as_bytes();

    if bytes.len() >= 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
        let hex = &t[2..];
        let len = prefix_len(hex, |c| c.is_ascii_hexdigit());
        if len > 0 {
            let mag = accumulate(&hex[..len], 16);
            return Some((apply_sign(mag, negative), &hex[len..]));
        }
        // Bare "0x": the leading zero is the number, 'x' is remainder.
        return Some((0, &t[1..]));
    }

    if bytes.first() == Some(&b'0') {
        let len = prefix_len(t, |c| ('0'..='7').contains(&c));
        let mag = accumulate(&t[..len], 8);
        return Some((apply_sign(mag, negative), &t[len..]));
    }

    let len = prefix_len(t, |c| c.is_ascii_digit());
    if len == 0 {
        return None;
    }
    let mag = accumulate(&t[..len], 10);
    Some((apply_sign(mag, negative), &t[len..]))
}

fn accumulate(digits: &str, radix: u32) -> i128 {
    let mut total: i128 = 0;
    for c in digits.chars() {
        let d = c.to_digit(radix).unwrap_or(0) as i128;
        total = total.saturating_mul(radix as i128).saturating_add(d);
    }
    total
}

fn apply_sign(magnitude: i128, negative: bool) -> i128 {
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

fn scan_i32(s: &str) -> Result<(i32, &str), String> {
    let Some((val, rest)) = scan_integer(s) else {
        return Err(format!("Failed to parse '{}' as an integer", clip(s)));
    };
    if val < i32::MIN as i128 || val > i32::MAX as i128 {
        return Err(format!(
            "Value ({val}) outside integer range ({} - {})",
            i32::MIN,
            i32::MAX
        ));
    }
    Ok((val as i32, rest))
}

fn scan_i16(s: &str) -> Result<(i16, &str), String> {
    let Some((val, rest)) = scan_integer(s) else {
        return Err(format!("Failed to parse '{}' as a short integer", clip(s)));
    };
    if val < i16::MIN as i128 || val > i16::MAX as i128 {
        return Err(format!(
            "Value ({val}) outside short integer range ({} - {})",
            i16::MIN,
            i16::MAX
        ));
    }
    Ok((val as i16, rest))
}

/// Scan a float prefix: `[sign] digits [. digits] [e|E [sign] digits]`,
/// longest valid prefix, exponent only consumed when it has digits.
fn scan_f32(s: &str) -> Result<(f32, &str), String> {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut pos = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        pos += 1;
    }
    let int_digits = digit_run(bytes, pos);
    pos += int_digits;

    let mut frac_digits = 0;
    if bytes.get(pos) == Some(&b'.') {
        frac_digits = digit_run(bytes, pos + 1);
        if int_digits > 0 || frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return Err(format!(
            "Failed to parse '{}' as a floating-point number",
            clip(s)
        ));
    }

    if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
        let mut exp_pos = pos + 1;
        if matches!(bytes.get(exp_pos), Some(b'+') | Some(b'-')) {
            exp_pos += 1;
        }
        let exp_digits = digit_run(bytes, exp_pos);
        if exp_digits > 0 {
            pos = exp_pos + exp_digits;
        }
    }

    let val: f32 = t[..pos].parse().map_err(|_| {
        format!("Failed to parse '{}' as a floating-point number", clip(s))
    })?;
    if val.is_infinite() {
        return Err(format!(
            "Failed to parse '{}' as a floating-point number: result out of range",
            clip(s)
        ));
    }
    Ok((val, &t[pos..]))
}

const BOOL_TERMS: &[(&str, bool)] = &[
    ("true", true),
    ("false", false),
    ("yes", true),
    ("no", false),
    ("1", true),
    ("0", false),
    ("on", true),
    ("off", false),
];

/// Scan the maximal alphanumeric prefix and match it case-insensitively
/// against the boolean term table.
fn scan_bool(s: &str) -> Result<(bool, &str), String> {
    let len = prefix_len(s, |c| c.is_ascii_alphanumeric());
    let word = &s[..len];
    for (term, value) in BOOL_TERMS {
        if term.len() == len && term.eq_ignore_ascii_case(word) {
            return Ok((*value, &s[len..]));
        }
    }
    Err(format!("Failed to parse '{}' as a boolean", clip(s)))
}

/// Scan a string: a leading `'` or `"` quotes it (delimiter characters
/// inside are literal, closing quote required); otherwise the value runs to
/// the first delimiter with trailing whitespace trimmed, and must be
/// non-empty.
fn scan_str<'a>(s: &'a str, delims: &[char]) -> Result<(String, &'a str), String> {
    match s.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let body = &s[1..];
            match body.find(quote) {
                None => Err(format!("Closing quotation mark ({quote}) not found")),
                Some(end) => Ok((body[..end].to_string(), &body[end + quote.len_utf8()..])),
            }
        }
        _ => {
            let end = s.find(delims).unwrap_or(s.len());
            let text = s[..end].trim_end();
            if text.is_empty() {
                return Err("Unquoted empty string".to_string());
            }
            Ok((text.to_string(), &s[end..]))
        }
    }
}

/// Drive a scalar scanner over a comma-separated list. Members are
/// whitespace-trimmed individually; at least one is required (the first
/// scan fails on empty input).
fn scan_list<'a, T>(
    input: &'a str,
    scan: impl Fn(&'a str) -> Result<(T, &'a str), String>,
) -> Result<(Vec<T>, &'a str), String> {
    let mut values = Vec::new();
    let mut s = input;
    loop {
        let (value, rest) = scan(s)?;
        values.push(value);
        s = rest.trim_start();
        match s.strip_prefix(',') {
            Some(after) => s = after.trim_start(),
            None => break,
        }
    }
    Ok((values, s))
}

fn join_list<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    items.iter().map(f).collect::<Vec<_>>().join(", ")
}

fn mismatch(ty: &dyn OptionType) -> String {
    format!("Cannot format value as {}", ty.name())
}

pub struct IntType;

impl OptionType for IntType {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (val, rest) = scan_i32(input)?;
        Ok(Parsed::new(Value::Int(val), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::Int(v) => Ok(v.to_string()),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Int(_))
    }
}

pub struct IntListType;

impl OptionType for IntListType {
    fn name(&self) -> &'static str {
        "list of integers"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (vals, rest) = scan_list(input, scan_i32)?;
        Ok(Parsed::new(Value::IntList(vals), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::IntList(vs) => Ok(join_list(vs, i32::to_string)),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::IntList(_))
    }
}

pub struct ShortType;

impl OptionType for ShortType {
    fn name(&self) -> &'static str {
        "short integer"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (val, rest) = scan_i16(input)?;
        Ok(Parsed::new(Value::Short(val), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::Short(v) => Ok(v.to_string()),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Short(_))
    }
}

pub struct ShortListType;

impl OptionType for ShortListType {
    fn name(&self) -> &'static str {
        "list of short integers"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (vals, rest) = scan_list(input, scan_i16)?;
        Ok(Parsed::new(Value::ShortList(vals), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::ShortList(vs) => Ok(join_list(vs, i16::to_string)),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::ShortList(_))
    }
}

pub struct FloatType;

impl OptionType for FloatType {
    fn name(&self) -> &'static str {
        "floating-point number"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (val, rest) = scan_f32(input)?;
        Ok(Parsed::new(Value::Float(val), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::Float(v) => Ok(format!("{v:.6}")),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }
}

pub struct FloatListType;

impl OptionType for FloatListType {
    fn name(&self) -> &'static str {
        "list of floating-point numbers"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (vals, rest) = scan_list(input, scan_f32)?;
        Ok(Parsed::new(Value::FloatList(vals), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::FloatList(vs) => Ok(join_list(vs, |v| format!("{v:.6}"))),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::FloatList(_))
    }
}

pub struct StringType;

impl OptionType for StringType {
    fn name(&self) -> &'static str {
        "string"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (val, rest) = scan_str(input, &[';', '#'])?;
        Ok(Parsed::new(Value::Str(val), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::Str(v) => Ok(v.clone()),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Str(_))
    }
}

pub struct StrListType;

impl OptionType for StrListType {
    fn name(&self) -> &'static str {
        "list of strings"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        // List members also stop at the separating comma.
        let (vals, rest) = scan_list(input, |s| scan_str(s, &[',', ';', '#']))?;
        Ok(Parsed::new(Value::StrList(vals), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::StrList(vs) => Ok(vs.join(", ")),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::StrList(_))
    }
}

pub struct BoolType;

impl OptionType for BoolType {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (val, rest) = scan_bool(input)?;
        Ok(Parsed::new(Value::Bool(val), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::Bool(v) => Ok(if *v { "true" } else { "false" }.to_string()),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }
}

pub struct BoolListType;

impl OptionType for BoolListType {
    fn name(&self) -> &'static str {
        "list of booleans"
    }

    fn parse<'a>(&self, input: &'a str) -> Result<Parsed<'a>, String> {
        let (vals, rest) = scan_list(input, scan_bool)?;
        Ok(Parsed::new(Value::BoolList(vals), rest))
    }

    fn format(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::BoolList(vs) => Ok(join_list(vs, |v| {
                if *v { "true" } else { "false" }.to_string()
            })),
            _ => Err(mismatch(self)),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::BoolList(_))
    }
}

pub static INT: IntType = IntType;
pub static INT_LIST: IntListType = IntListType;
pub static SHORT: ShortType = ShortType;
pub static SHORT_LIST: ShortListType = ShortListType;
pub static FLOAT: FloatType = FloatType;
pub static FLOAT_LIST: FloatListType = FloatListType;
pub static STRING: StringType = StringType;
pub static STR_LIST: StrListType = StrListType;
pub static BOOL: BoolType = BoolType;
pub static BOOL_LIST: BoolListType = BoolListType;
