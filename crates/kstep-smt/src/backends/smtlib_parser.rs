//! Parsing of solver output: s-expressions and model values.
//!
//! Both backends print numerals in SMT-LIB form (`5`, `(- 7)`, `1.0`,
//! `(/ 3.0 5.0)`, `(- (/ 1.0 2.0))`); these helpers turn them back into
//! exact [`ModelValue`]s.

use num::rational::BigRational;
use num::{ToPrimitive, Zero};

use kstep_ir::rational::parse_rational;

use crate::solver::ModelValue;
use crate::sorts::SmtSort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

/// Parse exactly one s-expression; trailing non-whitespace is an error.
pub fn parse_sexp(text: &str) -> Result<Sexp, String> {
    let tokens = tokenize(text);
    let mut pos = 0usize;
    let sexp = parse_tokens(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("trailing input after s-expression in `{}`", text.trim()));
    }
    Ok(sexp)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quoted_symbol = false;
    let mut in_string = false;
    for ch in text.chars() {
        if in_string {
            buf.push(ch);
            if ch == '"' {
                in_string = false;
                out.push(std::mem::take(&mut buf));
            }
            continue;
        }
        match ch {
            '"' if !in_quoted_symbol => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                buf.push(ch);
                in_string = true;
            }
            '|' => {
                in_quoted_symbol = !in_quoted_symbol;
            }
            '(' | ')' if !in_quoted_symbol => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                out.push(ch.to_string());
            }
            c if c.is_whitespace() && !in_quoted_symbol => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            other => buf.push(other),
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

fn parse_tokens(tokens: &[String], pos: &mut usize) -> Result<Sexp, String> {
    let Some(token) = tokens.get(*pos) else {
        return Err("unexpected end of s-expression".into());
    };
    *pos += 1;
    match token.as_str() {
        "(" => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos).map(String::as_str) {
                    Some(")") => {
                        *pos += 1;
                        return Ok(Sexp::List(items));
                    }
                    Some(_) => items.push(parse_tokens(tokens, pos)?),
                    None => return Err("unbalanced parentheses".into()),
                }
            }
        }
        ")" => Err("unexpected `)`".into()),
        atom => Ok(Sexp::Atom(atom.to_string())),
    }
}

/// Evaluate a numeral expression built from `-` and `/`.
pub fn sexp_to_rational(sexp: &Sexp) -> Result<BigRational, String> {
    match sexp {
        Sexp::Atom(atom) => parse_rational(atom).map_err(|e| e.to_string()),
        Sexp::List(items) => match items.as_slice() {
            [Sexp::Atom(op), inner] if op == "-" => Ok(-sexp_to_rational(inner)?),
            [Sexp::Atom(op), lhs, rhs] if op == "-" => {
                Ok(sexp_to_rational(lhs)? - sexp_to_rational(rhs)?)
            }
            [Sexp::Atom(op), numer, denom] if op == "/" => {
                let numer = sexp_to_rational(numer)?;
                let denom = sexp_to_rational(denom)?;
                if denom.is_zero() {
                    return Err("division by zero in model value".into());
                }
                Ok(numer / denom)
            }
            [Sexp::Atom(op), inner] if op == "to_real" => sexp_to_rational(inner),
            _ => Err(format!("unsupported numeral expression {sexp:?}")),
        },
    }
}

pub fn sexp_to_model_value(sexp: &Sexp, sort: &SmtSort) -> Result<ModelValue, String> {
    match sort {
        SmtSort::Bool => match sexp {
            Sexp::Atom(a) if a == "true" => Ok(ModelValue::Bool(true)),
            Sexp::Atom(a) if a == "false" => Ok(ModelValue::Bool(false)),
            other => Err(format!("expected Bool value, got {other:?}")),
        },
        SmtSort::Int => {
            let value = sexp_to_rational(sexp)?;
            if !value.is_integer() {
                return Err(format!("expected Int value, got {value}"));
            }
            value
                .to_integer()
                .to_i64()
                .map(ModelValue::Int)
                .ok_or_else(|| format!("Int value {value} does not fit in i64"))
        }
        SmtSort::Real => sexp_to_rational(sexp).map(ModelValue::Real),
    }
}

/// Parse a printed model value of the given sort.
pub fn parse_model_value(text: &str, sort: &SmtSort) -> Result<ModelValue, String> {
    let sexp = parse_sexp(text)?;
    sexp_to_model_value(&sexp, sort)
}

/// Extract the value for `name` from a `(get-value (name))` response:
/// `((name value))`.
pub fn parse_get_value_response(
    response: &str,
    name: &str,
    sort: &SmtSort,
) -> Result<ModelValue, String> {
    let sexp = parse_sexp(response)?;
    let Sexp::List(pairs) = &sexp else {
        return Err(format!("malformed get-value response `{}`", response.trim()));
    };
    for pair in pairs {
        if let Sexp::List(items) = pair {
            if let [Sexp::Atom(key), value] = items.as_slice() {
                if key == name {
                    return sexp_to_model_value(value, sort);
                }
            }
        }
    }
    Err(format!("no value for `{name}` in `{}`", response.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstep_ir::rational::{integer, ratio};

    #[test]
    fn parse_int_values() {
        assert_eq!(parse_model_value("42", &SmtSort::Int), Ok(ModelValue::Int(42)));
        assert_eq!(parse_model_value("(- 7)", &SmtSort::Int), Ok(ModelValue::Int(-7)));
        assert!(parse_model_value("(/ 1 2)", &SmtSort::Int).is_err());
    }

    #[test]
    fn parse_real_values_in_every_printed_form() {
        let cases = [
            ("3/5", ratio(3, 5)),
            ("3.0", integer(3)),
            ("0.25", ratio(1, 4)),
            ("(/ 3.0 5.0)", ratio(3, 5)),
            ("(- (/ 3.0 5.0))", ratio(-3, 5)),
            ("(/ (- 3) 5)", ratio(-3, 5)),
            ("(- 1.0)", integer(-1)),
        ];
        for (text, expected) in cases {
            assert_eq!(
                parse_model_value(text, &SmtSort::Real),
                Ok(ModelValue::Real(expected)),
                "while parsing `{text}`"
            );
        }
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_model_value("true", &SmtSort::Bool), Ok(ModelValue::Bool(true)));
        assert_eq!(
            parse_model_value(" false ", &SmtSort::Bool),
            Ok(ModelValue::Bool(false))
        );
        assert!(parse_model_value("1", &SmtSort::Bool).is_err());
    }

    #[test]
    fn get_value_response_spanning_lines() {
        let response = "((vA_3\n  (/ 21.0 40.0)))";
        assert_eq!(
            parse_get_value_response(response, "vA_3", &SmtSort::Real),
            Ok(ModelValue::Real(ratio(21, 40)))
        );
        assert!(parse_get_value_response(response, "vB_3", &SmtSort::Real).is_err());
    }

    #[test]
    fn quoted_symbols_and_strings_are_single_atoms() {
        assert_eq!(
            parse_sexp("(error \"line 1 (col 2)\")"),
            Ok(Sexp::List(vec![
                Sexp::Atom("error".into()),
                Sexp::Atom("\"line 1 (col 2)\"".into()),
            ]))
        );
        assert_eq!(
            parse_sexp("(|a b| c)"),
            Ok(Sexp::List(vec![Sexp::Atom("a b".into()), Sexp::Atom("c".into())]))
        );
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(parse_sexp("((x 1)").is_err());
        assert!(parse_sexp("(x 1))").is_err());
        assert!(parse_sexp("").is_err());
    }
}
