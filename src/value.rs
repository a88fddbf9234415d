//! Structured values exchanged with a PVAccess server.
//!
//! The server side renders every reply and monitor update as loosely-formed
//! JSON-like text: non-finite doubles come out as bare `nan`/`inf` tokens (the
//! C++ stream representation), every structure member is followed by a
//! separator, including the last one, and string contents use C escapes. This
//! module turns that text into a strict [`Value`] in four stages:
//!
//! 1. [`repair`] replaces bare non-finite tokens with `null`.
//! 2. [`repair`] then removes separators that dangle before a `}` or `]`.
//! 3. [`repair`] rewrites the C escapes JSON lacks (`\xHH` byte runs, `\'`,
//!    `\a`, `\v`) as their JSON equivalents.
//! 4. The repaired text is parsed as JSON with [`serde_json`].
//!
//! The first two steps leave the contents of string literals untouched. Repair is
//! unconditional: there is no way to tell malformed text from text that needs
//! repair before trying.
//!
//! Numbers keep their lexical kind. An integer lexeme becomes [`Number::Int`] (or
//! [`Number::UInt`] if it is above [`i64::MAX`]), anything with a fraction or an
//! exponent becomes [`Number::Float`]. Numbers too large for an [`f64`] are an
//! error, and nesting deeper than 128 levels is an error.
//!
//! The [`Display`](fmt::Display) implementation of [`Value`] renders canonical
//! compact text which [`decode`] parses back to an equal value.

use std::{fmt, fmt::Write, str::FromStr};

use thiserror::Error;

/// A fully decoded value
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

/// Numeric payload of a [`Value`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    /// Only used for integers that do not fit in an [`i64`]
    UInt(u64),
    Float(f64),
}

/// Insertion-ordered, string-keyed map used for structure values.
///
/// Inserting an existing key replaces the value but keeps the original
/// position, so the member order of a structure is always the order the
/// server first sent it in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

/// Text could not be parsed even after repair
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed value: {reason}")]
pub struct DecodeError {
    /// Byte offset into the repaired text where the parser gave up
    pub offset: usize,
    pub reason: String,
}

impl DecodeError {
    fn from_json(err: &serde_json::Error, text: &str) -> Self {
        // serde_json reports 1-based lines and byte columns
        let line_start: usize = text
            .split_inclusive('\n')
            .take(err.line().saturating_sub(1))
            .map(str::len)
            .sum();
        DecodeError {
            offset: (line_start + err.column().saturating_sub(1)).min(text.len()),
            reason: err.to_string(),
        }
    }
}

/// Repair and parse a wire payload
pub fn decode(raw: &str) -> Result<Value, DecodeError> {
    let repaired = repair(raw);
    serde_json::from_str::<serde_json::Value>(&repaired)
        .map(Value::from)
        .map_err(|e| DecodeError::from_json(&e, &repaired))
}

/// Apply the token, structural and escape repairs to a raw payload, without
/// parsing it
pub fn repair(raw: &str) -> String {
    translate_escapes(&strip_dangling_separators(&replace_non_finite(raw)))
}

/// Tracks whether a scan position is inside a string literal
#[derive(Default)]
struct StringTracker {
    in_string: bool,
    escaped: bool,
}

impl StringTracker {
    /// Feed the next character. Returns true if it belongs to a string literal,
    /// including both quotes.
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            true
        } else if c == '"' {
            self.in_string = true;
            true
        } else {
            false
        }
    }
}

fn is_non_finite_token(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "nan" | "inf" | "infinity"
    )
}
fn replace_non_finite(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut strings = StringTracker::default();
    let mut chars = raw.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if strings.feed(c) {
            out.push(c);
            continue;
        }
        let signed = matches!(c, '-' | '+')
            && chars.peek().is_some_and(|(_, n)| n.is_ascii_alphabetic());
        if !(signed || c.is_ascii_alphabetic()) {
            out.push(c);
            continue;
        }
        // Consume the whole bare word so that we only ever replace full tokens
        let mut end = start + c.len_utf8();
        while let Some(&(i, n)) = chars.peek() {
            if !n.is_ascii_alphanumeric() {
                break;
            }
            end = i + n.len_utf8();
            chars.next();
        }
        let word = &raw[start..end];
        if is_non_finite_token(word.trim_start_matches(['-', '+'])) {
            out.push_str("null");
        } else {
            out.push_str(word);
        }
    }
    out
}

fn strip_dangling_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut strings = StringTracker::default();
    for (i, c) in text.char_indices() {
        if !strings.feed(c)
            && c == ','
            && text[i + 1..].trim_start().starts_with(['}', ']'])
        {
            continue;
        }
        out.push(c);
    }
    out
}

/// Rewrite the C escapes that JSON does not have, inside string literals.
///
/// The server's escaper writes every byte it cannot print as `\xHH`, so a run
/// of them is one UTF-8 sequence. Runs that are not valid UTF-8 are left as they
/// are, and fail to parse.
fn translate_escapes(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut strings = StringTracker::default();
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c == '\\'
            && strings.in_string
            && !strings.escaped
            && let Some((replacement, consumed)) = translate_escape(rest)
        {
            out.push_str(&replacement);
            rest = &rest[consumed..];
            continue;
        }
        strings.feed(c);
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Translate the escape at the start of `text`, returning the JSON text and the
/// number of bytes consumed
fn translate_escape(text: &str) -> Option<(String, usize)> {
    match text.as_bytes().get(1)? {
        b'\'' => Some(("'".to_owned(), 2)),
        b'a' => Some(("\\u0007".to_owned(), 2)),
        b'v' => Some(("\\u000b".to_owned(), 2)),
        b'x' => {
            let mut bytes = Vec::new();
            while let Some(byte) = hex_byte(&text[bytes.len() * 4..]) {
                bytes.push(byte);
            }
            if bytes.is_empty() {
                return None;
            }
            let consumed = bytes.len() * 4;
            let decoded = String::from_utf8(bytes).ok()?;
            let mut out = String::with_capacity(decoded.len());
            for c in decoded.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    c if c.is_control() => {
                        let _ = write!(out, "\\u{:04x}", c as u32);
                    }
                    c => out.push(c),
                }
            }
            Some((out, consumed))
        }
        _ => None,
    }
}

/// Read one `\xHH` escape
fn hex_byte(text: &str) -> Option<u8> {
    let digits = text.strip_prefix("\\x")?.get(..2)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Number(Number::Int(v))
                } else if let Some(v) = n.as_u64() {
                    Value::Number(Number::UInt(v))
                } else {
                    // serde_json never holds a non-finite number
                    n.as_f64().map_or(Value::Null, Value::from)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => Value::Object(members.into_iter().collect()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    /// Non-finite floats have no JSON representation and become `null`
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(Number::Int(v)) => serde_json::Value::from(*v),
            Value::Number(Number::UInt(v)) => serde_json::Value::from(*v),
            Value::Number(Number::Float(v)) => serde_json::Value::from(*v),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => items.iter().map(serde_json::Value::from).collect(),
            Value::Object(members) => serde_json::Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.to_owned(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => v as f64,
            Number::UInt(v) => v as f64,
            Number::Float(v) => v,
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(v) => Some(v),
            Number::UInt(v) => i64::try_from(v).ok(),
            Number::Float(_) => None,
        }
    }
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Number::Int(v) => u64::try_from(v).ok(),
            Number::UInt(v) => Some(v),
            Number::Float(_) => None,
        }
    }
    pub fn is_finite(&self) -> bool {
        match self {
            Number::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl Map {
    pub fn new() -> Self {
        Map::default()
    }
    /// Insert a member, returning the previous value if the key existed
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for Map
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    /// True for anything that is not an array or a structure
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }
    pub fn as_u64(&self) -> Option<u64> {
        self.as_number().and_then(Number::as_u64)
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a member of a structure value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Walk a dotted path, e.g. `alarm.severity`.
    ///
    /// Path segments index structure members by name and array elements by
    /// position. This is the same dotted form that put field names use.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |current, segment| match current {
            Value::Object(m) => m.get(segment),
            Value::Array(v) => segment.parse::<usize>().ok().and_then(|i| v.get(i)),
            _ => None,
        })
    }

    /// Mutable version of [`Value::pointer`]
    pub fn pointer_mut(&mut self, path: &str) -> Option<&mut Value> {
        path.split('.')
            .try_fold(self, |current, segment| match current {
                Value::Object(m) => m.get_mut(segment),
                Value::Array(v) => segment.parse::<usize>().ok().and_then(|i| v.get_mut(i)),
                _ => None,
            })
    }
}

impl fmt::Display for Value {
    /// Canonical compact JSON. Floats always carry a fraction or exponent so
    /// that they parse back as floats.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self))
    }
}

impl FromStr for Value {
    type Err = DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

macro_rules! value_from_number {
    ($($t:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Number(Number::$variant(v as $target))
                }
            }
        )*
    };
}

value_from_number!(
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(v) => Value::Number(Number::Int(v)),
            Err(_) => Value::Number(Number::UInt(v)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Value::Number(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object<const N: usize>(members: [(&str, Value); N]) -> Value {
        Value::Object(members.into_iter().collect())
    }

    #[test]
    fn non_finite_tokens_become_null() {
        assert_eq!(decode(r#"{"x": nan}"#).unwrap(), object([("x", Value::Null)]));
        assert_eq!(decode("nan").unwrap(), Value::Null);
        assert_eq!(decode("-nan").unwrap(), Value::Null);
        assert_eq!(decode("inf").unwrap(), Value::Null);
        assert_eq!(
            decode("[-inf, Infinity, NaN, 2]").unwrap(),
            Value::from(vec![Value::Null, Value::Null, Value::Null, 2.into()])
        );
    }

    #[test]
    fn repair_leaves_strings_alone() {
        assert_eq!(
            decode(r#"{"units": "nanometer", "note": "inf, ]"}"#).unwrap(),
            object([("units", "nanometer".into()), ("note", "inf, ]".into())])
        );
        assert_eq!(decode(r#""nan""#).unwrap(), Value::from("nan"));
        assert_eq!(repair(r#"["a\"nan,]", nan,]"#), r#"["a\"nan,]", null]"#);
    }

    #[test]
    fn dangling_separators_are_removed() {
        assert_eq!(decode("[1,2,]").unwrap(), Value::from(vec![1, 2]));
        assert_eq!(
            decode("{\"a\": 1,\n \"b\": {\"c\": true,\n},\n}").unwrap(),
            object([("a", 1.into()), ("b", object([("c", true.into())]))])
        );
        // Only one separator is ever dangling; a doubled one is still an error
        assert!(decode("[1,,]").is_err());
        assert!(decode("[,]").is_err());
    }

    #[test]
    fn decodes_server_structure() {
        let raw = concat!(
            " {\n",
            "\"id\": \"epics:nt/NTScalar:1.0\",\n",
            "    \"value\": nan,\n",
            "    \"alarm\": {\n",
            "        \"severity\": 0,\n",
            "        \"status\": 0,\n",
            "        \"message\": \"\",\n",
            "    },\n",
            "    \"timeStamp\": {\n",
            "        \"secondsPastEpoch\": 1741731609,\n",
            "        \"nanoseconds\": 500,\n",
            "    },\n",
            "}\n"
        );
        let value = decode(raw).unwrap();
        assert_eq!(value.get("id").and_then(Value::as_str), Some("epics:nt/NTScalar:1.0"));
        assert!(value.get("value").unwrap().is_null());
        assert_eq!(value.pointer("alarm.severity").and_then(Value::as_i64), Some(0));
        assert_eq!(value.pointer("alarm.message").and_then(Value::as_str), Some(""));
        assert_eq!(
            value.pointer("timeStamp.nanoseconds").and_then(Value::as_i64),
            Some(500)
        );
        assert_eq!(
            value.as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["id", "value", "alarm", "timeStamp"]
        );
    }

    #[test]
    fn number_kinds() {
        assert_eq!(decode("42").unwrap(), Value::Number(Number::Int(42)));
        assert_eq!(decode("-7").unwrap(), Value::Number(Number::Int(-7)));
        assert_eq!(
            decode("18446744073709551615").unwrap(),
            Value::Number(Number::UInt(u64::MAX))
        );
        assert_eq!(decode("1.5").unwrap(), Value::Number(Number::Float(1.5)));
        assert_eq!(decode("1e+06").unwrap(), Value::Number(Number::Float(1e6)));
        assert_eq!(decode("2.5E-3").unwrap().as_f64(), Some(0.0025));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            decode(r#""a\"b\\c\n\té\x41""#).unwrap(),
            Value::from("a\"b\\c\n\téA")
        );
        assert_eq!(decode(r#""😀""#).unwrap(), Value::from("😀"));
        assert!(decode(r#""\ud83d""#).is_err());
        assert!(decode(r#""\q""#).is_err());
    }

    #[test]
    fn server_escapes() {
        // Bytes the server cannot print come out one \xHH per byte
        assert_eq!(decode(r#""\xc3\xa9""#).unwrap(), Value::from("é"));
        assert_eq!(
            decode(r#""\xce\xbcm \xe2\x84\x83""#).unwrap(),
            Value::from("μm ℃")
        );
        assert_eq!(
            decode(r#""operator\'s note""#).unwrap(),
            Value::from("operator's note")
        );
        assert_eq!(
            decode(r#""bell\a tab\v""#).unwrap(),
            Value::from("bell\u{7} tab\u{b}")
        );
        assert_eq!(decode(r#""\x22\x5c""#).unwrap(), Value::from("\"\\"));
        // An escaped backslash followed by x is just text
        assert_eq!(decode(r#""\\x41""#).unwrap(), Value::from("\\x41"));
        // Member names are string literals too, but nothing outside one is touched
        assert_eq!(repair(r#"{"a\x41": 1}"#), r#"{"aA": 1}"#);
        assert_eq!(repair(r"[\x41]"), r"[\x41]");
        // A lone continuation byte is not text
        assert!(decode(r#""\xa9""#).is_err());
        assert!(decode(r#""\xzz""#).is_err());
    }

    #[test]
    fn out_of_range_numbers_are_errors() {
        assert!(decode("1e400").is_err());
        assert!(decode(&format!("[1{}]", "0".repeat(400))).is_err());
        assert_eq!(decode("1e-400").unwrap(), Value::from(0.0));
        // Integers past u64 fall back to floats
        assert_eq!(
            decode("100000000000000000000").unwrap(),
            Value::Number(Number::Float(1e20))
        );
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let nested = |n: usize| format!("{}{}", "[".repeat(n), "]".repeat(n));
        assert!(decode(&nested(100)).is_ok());
        for n in [1000, 3000, 100_000] {
            assert!(decode(&nested(n)).is_err());
        }
        let objects = format!("{}1{}", r#"{"a":"#.repeat(10_000), "}".repeat(10_000));
        assert!(decode(&objects).is_err());
    }

    #[test]
    fn malformed_input_reports_offset() {
        let err = decode("{bad").unwrap_err();
        assert_eq!(err.offset, 1);
        let err = decode("[1, 2").unwrap_err();
        assert!(err.offset > 0);
        // Errors inside strings point into the string, not at its start
        let err = decode(r#"["ok", "bad \q"]"#).unwrap_err();
        assert!(err.offset >= 8, "{err:?}");
        let err = decode("{\n\"a\": 1,\n\"b\": ?}").unwrap_err();
        assert_eq!(&"{\n\"a\": 1,\n\"b\": ?}"[err.offset..err.offset + 1], "?");
        assert!(decode("").is_err());
        assert!(decode("1 2").is_err());
        assert!(decode("\"unterminated").is_err());
        assert!(decode("{\"a\" 1}").is_err());
    }

    #[test]
    fn canonical_text_round_trips() {
        let original = object([
            ("id", "epics:nt/NTScalarArray:1.0".into()),
            ("value", vec![1.5, -0.25, 1e300, 3.0].into()),
            ("count", 3.into()),
            ("big", u64::MAX.into()),
            ("flags", vec![true, false].into()),
            ("label", "quote \" and \\ and\nnewline\u{1}".into()),
            ("nothing", Value::Null),
            ("empty", object([])),
            ("none", Value::Array(vec![])),
        ]);
        let text = original.to_string();
        assert_eq!(decode(&text).unwrap(), original);
        assert_eq!(text.parse::<Value>().unwrap(), original);
    }

    #[test]
    fn non_finite_numbers_render_as_null() {
        let v = Value::from(vec![f64::NAN, 1.0]);
        assert_eq!(v.to_string(), "[null,1.0]");
    }

    #[test]
    fn map_keeps_first_position_on_replace() {
        let mut map = Map::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.insert("a", 3), Some(Value::from(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::from(3)));
        assert_eq!(
            decode(r#"{"a": 1, "b": 2, "a": 3}"#).unwrap(),
            Value::Object(map)
        );
    }

    #[test]
    fn pointer_walks_arrays_and_structures() {
        let mut v = decode(r#"{"X": {"value": [10, 20]}}"#).unwrap();
        assert_eq!(v.pointer("X.value.1"), Some(&Value::from(20)));
        assert_eq!(v.pointer("X.missing"), None);
        assert_eq!(v.pointer("X.value.7"), None);
        *v.pointer_mut("X.value.0").unwrap() = Value::from(11);
        assert_eq!(v.to_string(), r#"{"X":{"value":[11,20]}}"#);
    }
}
