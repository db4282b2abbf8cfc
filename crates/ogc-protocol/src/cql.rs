//! Single-predicate CQL filters.
//!
//! User input only ever reaches a filter as a literal: text is wrapped in
//! single quotes with embedded quotes doubled, numbers must parse as finite
//! numbers, and prefix patterns have their wildcard characters escaped.
//! Field names come from the layer schema and are quoted when they are not
//! plain identifiers.

use map_common::{ComparisonOperator, FieldType, QueryError};

/// Escape character for LIKE patterns.
pub const LIKE_ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("field name is empty")]
    EmptyField,

    #[error("field name '{0}' contains control characters")]
    InvalidFieldName(String),

    #[error("value is empty")]
    EmptyValue,

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("operator {0} is not available for text fields")]
    OperatorNotAllowed(ComparisonOperator),

    #[error("malformed filter: {0}")]
    Malformed(String),
}

impl From<FilterError> for QueryError {
    fn from(err: FilterError) -> Self {
        let field = match err {
            FilterError::EmptyField | FilterError::InvalidFieldName(_) => "field",
            FilterError::OperatorNotAllowed(_) => "operator",
            _ => "value",
        };
        QueryError::invalid_input(field, err.to_string())
    }
}

/// Text literal with single quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape LIKE wildcards in a prefix and append the match-anything suffix.
pub fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Recover the prefix from a pattern built by [`like_prefix_pattern`].
///
/// Returns `None` when the pattern contains an unescaped wildcard other
/// than the trailing `%`.
pub fn unescape_like_prefix(pattern: &str) -> Option<String> {
    let body = pattern.strip_suffix('%')?;
    let mut prefix = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            LIKE_ESCAPE => prefix.push(chars.next()?),
            '%' | '_' => return None,
            other => prefix.push(other),
        }
    }
    Some(prefix)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Field name as it appears in a filter.
pub fn field_reference(name: &str) -> Result<String, FilterError> {
    if name.is_empty() {
        return Err(FilterError::EmptyField);
    }
    if name.chars().any(char::is_control) {
        return Err(FilterError::InvalidFieldName(name.to_string()));
    }
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Ok(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Validate a numeric value, returning the trimmed text to emit.
fn numeric_literal(value: &str) -> Result<&str, FilterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FilterError::EmptyValue);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(trimmed),
        _ => Err(FilterError::NotANumber(trimmed.to_string())),
    }
}

/// Build `field operator value` for a field of the given type.
///
/// Numeric comparisons are rendered without spaces (`height>50`); text
/// fields only support equality and the value is quoted.
pub fn comparison(
    field: &str,
    field_type: FieldType,
    operator: ComparisonOperator,
    value: &str,
) -> Result<String, FilterError> {
    let field = field_reference(field)?;
    match field_type {
        FieldType::Number => {
            let literal = numeric_literal(value)?;
            Ok(format!("{}{}{}", field, operator.symbol(), literal))
        }
        FieldType::String => {
            if operator != ComparisonOperator::Eq {
                return Err(FilterError::OperatorNotAllowed(operator));
            }
            Ok(format!("{}{}{}", field, operator.symbol(), quote_literal(value)))
        }
    }
}

/// Case-insensitive prefix match: `field ILIKE 'prefix%'`.
pub fn prefix_match(field: &str, prefix: &str) -> Result<String, FilterError> {
    let field = field_reference(field)?;
    Ok(format!(
        "{} ILIKE {}",
        field,
        quote_literal(&like_prefix_pattern(prefix))
    ))
}

/// Literal on the right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Text(String),
    /// Unquoted numeric text, as written
    Number(String),
}

impl LiteralValue {
    pub fn as_str(&self) -> &str {
        match self {
            LiteralValue::Text(s) | LiteralValue::Number(s) => s,
        }
    }
}

/// A parsed single-predicate filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        operator: ComparisonOperator,
        value: LiteralValue,
    },
    ILike {
        field: String,
        /// Pattern with escapes intact
        pattern: String,
    },
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Read a literal delimited by `quote`, where a doubled quote is an
    /// escaped one. The opening quote must be the next character.
    fn quoted(&mut self, quote: char) -> Result<String, FilterError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                        out.push(quote);
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
                None => {
                    return Err(FilterError::Malformed(format!(
                        "unterminated literal in '{}'",
                        self.input
                    )))
                }
            }
        }
    }

    fn field(&mut self) -> Result<String, FilterError> {
        if self.peek() == Some('"') {
            return self.quoted('"');
        }
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(FilterError::EmptyField);
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }
}

/// Parse a filter produced by [`comparison`] or [`prefix_match`].
pub fn parse_predicate(filter: &str) -> Result<Predicate, FilterError> {
    let mut cursor = Cursor {
        input: filter.trim(),
        pos: 0,
    };
    let field = cursor.field()?;
    cursor.skip_whitespace();

    let rest = cursor.rest();
    if rest
        .get(..5)
        .map_or(false, |keyword| keyword.eq_ignore_ascii_case("ILIKE"))
    {
        cursor.pos += 5;
        cursor.skip_whitespace();
        if cursor.peek() != Some('\'') {
            return Err(FilterError::Malformed(filter.to_string()));
        }
        let pattern = cursor.quoted('\'')?;
        if !cursor.rest().trim().is_empty() {
            return Err(FilterError::Malformed(filter.to_string()));
        }
        return Ok(Predicate::ILike { field, pattern });
    }

    // Two-character operators first so ">=" is not read as ">".
    let operator = [">=", "<=", "<>", "=", ">", "<"]
        .into_iter()
        .find(|symbol| rest.starts_with(symbol))
        .and_then(ComparisonOperator::from_symbol)
        .ok_or_else(|| FilterError::Malformed(filter.to_string()))?;
    cursor.pos += operator.symbol().len();
    cursor.skip_whitespace();

    let value = if cursor.peek() == Some('\'') {
        let text = cursor.quoted('\'')?;
        if !cursor.rest().trim().is_empty() {
            return Err(FilterError::Malformed(filter.to_string()));
        }
        LiteralValue::Text(text)
    } else {
        LiteralValue::Number(numeric_literal(cursor.rest())?.to_string())
    };

    Ok(Predicate::Compare {
        field,
        operator,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparison_has_no_spaces() {
        let filter =
            comparison("height", FieldType::Number, ComparisonOperator::Gt, " 50 ").unwrap();
        assert_eq!(filter, "height>50");
    }

    #[test]
    fn test_numeric_value_must_be_a_number() {
        let result = comparison("height", FieldType::Number, ComparisonOperator::Gt, "50 OR 1=1");
        assert!(matches!(result, Err(FilterError::NotANumber(_))));
        let result = comparison("height", FieldType::Number, ComparisonOperator::Gt, "NaN");
        assert!(matches!(result, Err(FilterError::NotANumber(_))));
        let result = comparison("height", FieldType::Number, ComparisonOperator::Gt, "  ");
        assert_eq!(result, Err(FilterError::EmptyValue));
    }

    #[test]
    fn test_text_comparison_is_quoted() {
        let filter =
            comparison("name", FieldType::String, ComparisonOperator::Eq, "O'Brien").unwrap();
        assert_eq!(filter, "name='O''Brien'");
    }

    #[test]
    fn test_text_comparison_only_allows_equality() {
        let result = comparison("name", FieldType::String, ComparisonOperator::Gt, "a");
        assert_eq!(
            result,
            Err(FilterError::OperatorNotAllowed(ComparisonOperator::Gt))
        );
    }

    #[test]
    fn test_field_reference_quoting() {
        assert_eq!(field_reference("pop_2020").unwrap(), "pop_2020");
        assert_eq!(field_reference("área").unwrap(), "\"área\"");
        assert_eq!(field_reference("my field").unwrap(), "\"my field\"");
        assert_eq!(field_reference(""), Err(FilterError::EmptyField));
        assert!(field_reference("a\nb").is_err());
    }

    #[test]
    fn test_like_prefix_pattern() {
        assert_eq!(like_prefix_pattern("Av"), "Av%");
        assert_eq!(like_prefix_pattern("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix_pattern("a\\b"), "a\\\\b%");
    }

    #[test]
    fn test_prefix_match() {
        assert_eq!(prefix_match("name", "Rua").unwrap(), "name ILIKE 'Rua%'");
        assert_eq!(
            prefix_match("name", "d'Ávila").unwrap(),
            "name ILIKE 'd''Ávila%'"
        );
    }

    #[test]
    fn test_parse_quoted_field() {
        let predicate = parse_predicate("\"my field\"<>'x'").unwrap();
        assert_eq!(
            predicate,
            Predicate::Compare {
                field: "my field".into(),
                operator: ComparisonOperator::Ne,
                value: LiteralValue::Text("x".into()),
            }
        );
    }

    #[test]
    fn test_parse_rejects_trailing_syntax() {
        assert!(parse_predicate("name='a' OR name='b'").is_err());
        assert!(parse_predicate("name='unterminated").is_err());
        assert!(parse_predicate("height>50 OR 1=1").is_err());
    }
}
