//! Splits a free-text submission into glucose values.
//!
//! Tokens are separated by commas and trimmed. A token is numeric only if
//! it is a plain decimal (optional sign, digits, optional fraction); forms
//! such as `1e2`, `inf` or `0x5f` are rejected even though `f64::from_str`
//! would take some of them.

use std::fmt;

use serde::Serialize;

use super::CollectorConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TokenProblem {
    Empty,
    NotNumeric,
    OutOfRange { value: f64, min: f64, max: f64 },
}

/// One rejected token of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidToken {
    /// 1-based position within the submission
    pub position: usize,
    pub token: String,
    pub problem: TokenProblem,
}

impl fmt::Display for InvalidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            TokenProblem::Empty => write!(f, "entry {} is empty", self.position),
            TokenProblem::NotNumeric => write!(f, "'{}' is not a number", self.token),
            TokenProblem::OutOfRange { value, min, max } => {
                write!(f, "{value} is outside the accepted range {min}-{max} mg/dL")
            }
        }
    }
}

fn is_plain_decimal(token: &str) -> bool {
    let unsigned = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };

    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    match fraction {
        None => !whole.is_empty() && digits(whole),
        Some(fraction) => {
            (!whole.is_empty() || !fraction.is_empty()) && digits(whole) && digits(fraction)
        }
    }
}

fn parse_token(position: usize, raw: &str, config: &CollectorConfig) -> Result<f64, InvalidToken> {
    let token = raw.trim();
    let invalid = |problem| InvalidToken {
        position,
        token: token.to_string(),
        problem,
    };

    if token.is_empty() {
        return Err(invalid(TokenProblem::Empty));
    }
    if !is_plain_decimal(token) {
        return Err(invalid(TokenProblem::NotNumeric));
    }

    let value: f64 = token
        .parse()
        .map_err(|_| invalid(TokenProblem::NotNumeric))?;

    if !config.accepts(value) {
        return Err(invalid(TokenProblem::OutOfRange {
            value,
            min: config.min_mg_dl,
            max: config.max_mg_dl,
        }));
    }

    Ok(value)
}

/// Parse every comma-separated token of `input`.
///
/// All-or-nothing: returns the values in input order when every token is
/// valid, otherwise every problem found.
pub fn parse_readings(input: &str, config: &CollectorConfig) -> Result<Vec<f64>, Vec<InvalidToken>> {
    let mut values = Vec::new();
    let mut problems = Vec::new();

    for (index, raw) in input.split(',').enumerate() {
        match parse_token(index + 1, raw, config) {
            Ok(value) => values.push(value),
            Err(problem) => problems.push(problem),
        }
    }

    if problems.is_empty() {
        Ok(values)
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<f64>, Vec<InvalidToken>> {
        parse_readings(input, &CollectorConfig::default())
    }

    #[test]
    fn test_values_keep_input_order() {
        assert_eq!(parse("95,110,102").unwrap(), vec![95.0, 110.0, 102.0]);
    }

    #[test]
    fn test_whitespace_is_trimmed_per_token() {
        assert_eq!(parse("  95 , 110 ").unwrap(), vec![95.0, 110.0]);
        assert_eq!(parse("\t120.5\n").unwrap(), vec![120.5]);
    }

    #[test]
    fn test_decimal_forms() {
        assert_eq!(parse("98.6, .5e0").unwrap_err().len(), 1);
        assert_eq!(parse("98., 99").unwrap(), vec![98.0, 99.0]);
        assert!(!is_plain_decimal("."));
        assert!(!is_plain_decimal("1.2.3"));
        assert!(is_plain_decimal("+42"));
    }

    #[test]
    fn test_non_numeric_token_rejects_batch() {
        let problems = parse("95, abc, 102").unwrap_err();
        assert_eq!(
            problems,
            vec![InvalidToken {
                position: 2,
                token: "abc".into(),
                problem: TokenProblem::NotNumeric,
            }]
        );
    }

    #[test]
    fn test_float_parser_extensions_are_not_numbers() {
        for token in ["inf", "NaN", "1e2", "0x5f", "١٢٣"] {
            let problems = parse(token).unwrap_err();
            assert_eq!(problems[0].problem, TokenProblem::NotNumeric, "{token}");
        }
    }

    #[test]
    fn test_out_of_range_and_negative() {
        let problems = parse("999999, -5, 600").unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(matches!(
            problems[0].problem,
            TokenProblem::OutOfRange { value, .. } if value == 999_999.0
        ));
        assert!(matches!(
            problems[1].problem,
            TokenProblem::OutOfRange { value, .. } if value == -5.0
        ));
    }

    #[test]
    fn test_empty_tokens() {
        assert_eq!(parse("").unwrap_err()[0].problem, TokenProblem::Empty);
        let problems = parse("95,,102").unwrap_err();
        assert_eq!(problems[0].position, 2);
        assert_eq!(problems[0].to_string(), "entry 2 is empty");
        assert_eq!(parse("95,").unwrap_err()[0].problem, TokenProblem::Empty);
    }

    #[test]
    fn test_semicolons_are_not_separators() {
        let problems = parse("95;110;102").unwrap_err();
        assert_eq!(problems[0].to_string(), "'95;110;102' is not a number");
    }
}
