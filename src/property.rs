//! Decoder for the engine's serialized property strings
//!
//! The dump stores structured recipe fields as text such as
//! `((ItemClass="/Script/Engine.BlueprintGeneratedClass'/Game/.../Desc_IronIngot.Desc_IronIngot_C'",Amount=3))`.
//! Elements are split with a balanced-parenthesis, quote-aware scanner so
//! values containing nested tuples or commas inside quotes survive intact.

use regex::Regex;
use tracing::debug;

use crate::error::{DecodeError, DecodeReason};

/// A decoded property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(n) => Some(*n),
            PropertyValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Integer(_) => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Integer(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A recipe amount as written in the dump. Only positive integers are
/// usable; anything else is kept verbatim so the recipe can be rejected with
/// the offending text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Integer(i64),
    RawText(String),
}

impl Amount {
    /// Parse free text, keeping it raw when it is not an integer
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"');
        match trimmed.parse::<i64>() {
            Ok(n) => Amount::Integer(n),
            Err(_) => Amount::RawText(trimmed.to_string()),
        }
    }

    /// JSON numbers: whole values become integers
    pub fn from_number(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Amount::Integer(n as i64)
        } else {
            Amount::RawText(n.to_string())
        }
    }

    /// The amount as a per-cycle count, if it is a positive integer
    pub fn positive(&self) -> Option<u32> {
        match self {
            Amount::Integer(n) if *n > 0 => u32::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl From<&PropertyValue> for Amount {
    fn from(value: &PropertyValue) -> Self {
        match value.as_integer() {
            Some(n) => Amount::Integer(n),
            None => Amount::RawText(value.to_string()),
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Amount::Integer(n) => write!(f, "{}", n),
            Amount::RawText(s) => write!(f, "{}", s),
        }
    }
}

/// One `(Key=Value,...)` element, fields kept in written order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRecord {
    pub fields: Vec<(String, PropertyValue)>,
}

impl PropertyRecord {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

/// Successfully decoded elements plus the errors of the ones that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub values: Vec<T>,
    pub errors: Vec<DecodeError>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            errors: Vec::new(),
        }
    }
}

pub struct PropertyDecoder {
    class_name_re: Regex,
}

impl PropertyDecoder {
    pub fn new() -> Result<Self, regex::Error> {
        // Last path token, ignoring trailing quotes and the closing tick
        let class_name_re = Regex::new(r#"([^./'"\s]+)['"\s]*$"#)?;
        Ok(Self { class_name_re })
    }

    /// Decode `((K=V,...),(K=V,...))` into one record per element.
    ///
    /// An element that fails to parse is reported in `errors` and skipped;
    /// the remaining elements are still returned.
    pub fn decode(&self, input: &str) -> Decoded<PropertyRecord> {
        let mut decoded = Decoded::default();
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return decoded;
        }

        let body = strip_outer_parens(trimmed).unwrap_or(trimmed);
        if !body.trim_start().starts_with('(') {
            // A single unwrapped element: `(K=V,K2=V2)`
            match self.decode_fields(body, body) {
                Ok(record) => decoded.values.push(record),
                Err(e) => decoded.errors.push(e),
            }
            return decoded;
        }

        let segments = split_top_level(body);
        if segments.iter().any(|s| s.problem.is_some()) && body.contains("),(") {
            debug!(input = trimmed, "broken nesting, splitting on element boundaries");
            return self.decode_by_boundaries(trimmed);
        }

        for segment in segments {
            let text = segment.text.trim();
            if let Some(reason) = segment.problem {
                decoded.errors.push(DecodeError::new(reason, text));
                continue;
            }
            if text.is_empty() {
                continue;
            }
            let inner = strip_outer_parens(text).unwrap_or(text);
            match self.decode_fields(inner, text) {
                Ok(record) => decoded.values.push(record),
                Err(e) => decoded.errors.push(e),
            }
        }

        decoded
    }

    /// Split a list whose parentheses do not balance on the literal `),(`
    /// boundary, so only the broken element is lost.
    fn decode_by_boundaries(&self, list: &str) -> Decoded<PropertyRecord> {
        let mut decoded = Decoded::default();
        let body = list.strip_prefix('(').unwrap_or(list);
        let body = if body.ends_with("))") {
            &body[..body.len() - 1]
        } else {
            body
        };

        for piece in body.split("),(") {
            let inner = piece.strip_prefix('(').unwrap_or(piece);
            let inner = inner.strip_suffix(')').unwrap_or(inner).trim();
            if inner.is_empty() {
                continue;
            }
            let fragment = format!("({})", inner);
            match self.decode_fields(inner, &fragment) {
                Ok(record) => decoded.values.push(record),
                Err(e) => decoded.errors.push(e),
            }
        }

        decoded
    }

    /// Decode a tuple of object references such as
    /// `("/Game/.../Build_ConstructorMk1.Build_ConstructorMk1_C","/Script/FactoryGame.FGBuildGun")`
    /// into their class names.
    pub fn decode_reference_list(&self, input: &str) -> Decoded<String> {
        let mut decoded = Decoded::default();
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return decoded;
        }

        let body = strip_outer_parens(trimmed).unwrap_or(trimmed);
        for segment in split_top_level(body) {
            let text = segment.text.trim();
            if let Some(reason) = segment.problem {
                decoded.errors.push(DecodeError::new(reason, text));
                continue;
            }
            let reference = strip_outer_parens(text).unwrap_or(text).trim_matches('"');
            if reference.trim().is_empty() {
                continue;
            }
            decoded.values.push(self.class_name(reference));
        }

        decoded
    }

    /// Extract the class name from an object path, e.g.
    /// `/Game/.../Desc_IronIngot.Desc_IronIngot_C'` -> `Desc_IronIngot_C`.
    /// Plain names come back unchanged apart from quote stripping.
    pub fn class_name(&self, reference: &str) -> String {
        let trimmed = reference.trim().trim_matches('"');
        match self.class_name_re.captures(trimmed) {
            Some(cap) => cap[1].to_string(),
            None => trimmed.trim_matches('\'').to_string(),
        }
    }

    fn decode_fields(&self, inner: &str, fragment: &str) -> Result<PropertyRecord, DecodeError> {
        let mut record = PropertyRecord::default();

        for pair in split_top_level(inner) {
            if let Some(reason) = pair.problem {
                return Err(DecodeError::new(reason, fragment));
            }
            let pair_text = pair.text.trim();
            if pair_text.is_empty() {
                continue;
            }
            let Some((key, raw_value)) = pair_text.split_once('=') else {
                return Err(DecodeError::new(DecodeReason::MissingSeparator, fragment));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(DecodeError::new(DecodeReason::EmptyKey, fragment));
            }
            let value = self
                .parse_value(raw_value)
                .ok_or_else(|| DecodeError::new(DecodeReason::EmptyValue, fragment))?;
            record.fields.push((key.to_string(), value));
        }

        if record.fields.is_empty() {
            return Err(DecodeError::new(DecodeReason::MissingSeparator, fragment));
        }
        Ok(record)
    }

    fn parse_value(&self, raw: &str) -> Option<PropertyValue> {
        let unquoted = raw.trim().trim_matches('"').trim();
        if unquoted.is_empty() {
            return None;
        }
        if unquoted.contains('/') {
            return Some(PropertyValue::Text(self.class_name(unquoted)));
        }
        match unquoted.parse::<i64>() {
            Ok(n) => Some(PropertyValue::Integer(n)),
            Err(_) => Some(PropertyValue::Text(unquoted.to_string())),
        }
    }
}

struct Segment<'a> {
    text: &'a str,
    problem: Option<DecodeReason>,
}

/// Split on commas that sit outside parentheses and double quotes
fn split_top_level(s: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut stray_close = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    stray_close = true;
                } else {
                    depth -= 1;
                }
            }
            ',' if depth == 0 => {
                let problem = stray_close.then_some(DecodeReason::UnbalancedParens);
                segments.push(Segment {
                    text: &s[start..i],
                    problem,
                });
                start = i + 1;
                stray_close = false;
            }
            _ => {}
        }
    }

    let problem = if in_quotes {
        Some(DecodeReason::UnterminatedQuote)
    } else if depth != 0 || stray_close {
        Some(DecodeReason::UnbalancedParens)
    } else {
        None
    };
    segments.push(Segment {
        text: &s[start..],
        problem,
    });

    segments
}

/// Return the contents of `s` when its first `(` is closed by its last `)`
fn strip_outer_parens(s: &str) -> Option<&str> {
    if !s.starts_with('(') || !s.ends_with(')') || s.len() < 2 {
        return None;
    }

    let mut depth = 0usize;
    let mut in_quotes = false;
    let last = s.len() - 1;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && i != last {
                    return None;
                }
            }
            _ => {}
        }
    }

    (depth == 0 && !in_quotes).then(|| &s[1..last])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> PropertyDecoder {
        PropertyDecoder::new().unwrap()
    }

    const INGOT: &str = r#"/Script/Engine.BlueprintGeneratedClass'/Game/FactoryGame/Resource/Parts/IronIngot/Desc_IronIngot.Desc_IronIngot_C'"#;

    #[test]
    fn decodes_every_well_formed_element() {
        let input = format!(
            r#"((ItemClass="{INGOT}",Amount=3),(ItemClass="{INGOT}",Amount=1),(ItemClass=Desc_Coal_C,Amount=2))"#
        );
        let decoded = decoder().decode(&input);

        assert!(decoded.errors.is_empty(), "{:?}", decoded.errors);
        assert_eq!(decoded.values.len(), 3);
        for record in &decoded.values {
            assert_eq!(record.keys().collect::<Vec<_>>(), vec!["ItemClass", "Amount"]);
        }
        assert_eq!(
            decoded.values[0].get("ItemClass"),
            Some(&PropertyValue::Text("Desc_IronIngot_C".into()))
        );
        assert_eq!(decoded.values[2].get("Amount"), Some(&PropertyValue::Integer(2)));
    }

    #[test]
    fn malformed_element_does_not_spoil_siblings() {
        let input = format!(
            r#"((ItemClass="{INGOT}",Amount=3),(ItemClass=,Amount=5),(ItemClass=Desc_Coal_C,Amount=2))"#
        );
        let decoded = decoder().decode(&input);

        assert_eq!(decoded.values.len(), 2);
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].reason, DecodeReason::EmptyValue);
        assert_eq!(decoded.errors[0].fragment, "(ItemClass=,Amount=5)");
    }

    #[test]
    fn empty_input_is_empty() {
        let d = decoder();
        assert_eq!(d.decode(""), Decoded::default());
        assert_eq!(d.decode("   "), Decoded::default());
        assert_eq!(d.decode_reference_list(""), Decoded::default());
    }

    #[test]
    fn nested_parens_and_quoted_commas_stay_in_value() {
        let input = r#"((Name="a,b",Offset=(X=1,Y=2)),(Name=c,Offset=(X=3,Y=4)))"#;
        let decoded = decoder().decode(input);

        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.values.len(), 2);
        assert_eq!(
            decoded.values[0].get("Name"),
            Some(&PropertyValue::Text("a,b".into()))
        );
        assert_eq!(
            decoded.values[0].get("Offset"),
            Some(&PropertyValue::Text("(X=1,Y=2)".into()))
        );
    }

    #[test]
    fn missing_separator_is_reported() {
        let decoded = decoder().decode("((ItemClass=Desc_A_C,Amount=1),(Junk))");
        assert_eq!(decoded.values.len(), 1);
        assert_eq!(decoded.errors[0].reason, DecodeReason::MissingSeparator);
    }

    #[test]
    fn unbalanced_element_keeps_its_siblings() {
        let decoded = decoder().decode(
            "((ItemClass=Desc_A_C,Amount=1),(ItemClass=Desc_B_C,Amount=(2),(ItemClass=Desc_C_C,Amount=3))",
        );

        assert_eq!(decoded.values.len(), 2);
        assert_eq!(
            decoded.values[0].get("ItemClass"),
            Some(&PropertyValue::Text("Desc_A_C".into()))
        );
        assert_eq!(decoded.values[1].get("Amount"), Some(&PropertyValue::Integer(3)));
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].reason, DecodeReason::UnbalancedParens);
        assert_eq!(decoded.errors[0].fragment, "(ItemClass=Desc_B_C,Amount=(2)");
    }

    #[test]
    fn missing_outer_close_still_yields_elements() {
        let decoded = decoder().decode("((ItemClass=Desc_A_C,Amount=1),(ItemClass=Desc_B_C,Amount=2)");
        assert_eq!(decoded.values.len(), 2);
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn unbalanced_single_element_is_reported() {
        let decoded = decoder().decode("((ItemClass=Desc_A_C,Amount=(1))");
        assert!(decoded.values.is_empty());
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].reason, DecodeReason::UnbalancedParens);
    }

    #[test]
    fn unterminated_quote_is_reported() {
        let decoded = decoder().decode(r#"((ItemClass="Desc_A_C,Amount=1))"#);
        assert!(decoded.values.is_empty());
        assert_eq!(decoded.errors[0].reason, DecodeReason::UnterminatedQuote);
    }

    #[test]
    fn single_unwrapped_element() {
        let decoded = decoder().decode("(ItemClass=Desc_A_C,Amount=4)");
        assert_eq!(decoded.values.len(), 1);
        assert_eq!(decoded.values[0].get("Amount"), Some(&PropertyValue::Integer(4)));
    }

    #[test]
    fn non_integer_values_stay_text() {
        let decoded = decoder().decode("((Amount=1.5,Mode=Fast))");
        assert_eq!(
            decoded.values[0].get("Amount"),
            Some(&PropertyValue::Text("1.5".into()))
        );
        assert_eq!(decoded.values[0].get("Mode").and_then(|v| v.as_text()), Some("Fast"));
    }

    #[test]
    fn reference_list_yields_class_names() {
        let input = r#"("/Game/FactoryGame/Buildable/Factory/ConstructorMk1/Build_ConstructorMk1.Build_ConstructorMk1_C","/Script/FactoryGame.FGBuildGun")"#;
        let decoded = decoder().decode_reference_list(input);
        assert!(decoded.errors.is_empty());
        assert_eq!(
            decoded.values,
            vec!["Build_ConstructorMk1_C".to_string(), "FGBuildGun".to_string()]
        );
    }

    #[test]
    fn amounts_only_accept_positive_integers() {
        assert_eq!(Amount::parse("3").positive(), Some(3));
        assert_eq!(Amount::parse("0").positive(), None);
        assert_eq!(Amount::parse("-2").positive(), None);
        assert_eq!(Amount::parse("lots"), Amount::RawText("lots".into()));
        assert_eq!(Amount::from_number(4.0), Amount::Integer(4));
        assert_eq!(Amount::from_number(0.5), Amount::RawText("0.5".into()));
        assert_eq!(Amount::from(&PropertyValue::Integer(7)).positive(), Some(7));
        assert_eq!(
            Amount::from(&PropertyValue::Text("1.5".into())),
            Amount::RawText("1.5".into())
        );
    }

    #[test]
    fn class_name_handles_ticks_and_plain_names() {
        let d = decoder();
        assert_eq!(d.class_name(INGOT), "Desc_IronIngot_C");
        assert_eq!(d.class_name(&format!("\"{INGOT}\"")), "Desc_IronIngot_C");
        assert_eq!(d.class_name("Desc_Coal_C"), "Desc_Coal_C");
    }
}
