//! Splits a JSON string's inner content into literal text and `${expr}`
//! placeholders.
//!
//! A straightforward `Peekable<Chars>` walk looking for an
//! expression-opening sequence; no validation of the expression body is
//! performed here — that happens later, in [`crate::expr`], and a body
//! that fails to parse is swallowed by the visitor rather than rejected at
//! scan time.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Expr(String),
}

/// Scans `input` for `${...}` placeholders. Expression bodies are not
/// nesting-aware (the first `}` closes them), matching the source grammar.
/// An unterminated `${` is treated as literal text from that point on,
/// since the enclosing [`crate::cst`] parser already guarantees this string
/// token is well-formed JSON (quotes matched) — only the `${` sugar inside
/// it can be malformed, and malformed sugar degrades to plain text rather
/// than aborting the whole string.
pub fn split_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut inner = String::new();
            let mut found = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found = true;
                    break;
                }
                inner.push(c);
            }
            if !found {
                // Unclosed placeholder: keep the `${` and everything after
                // it as literal text.
                buf.push_str("${");
                buf.push_str(&inner);
                continue;
            }
            if !buf.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut buf)));
            }
            segments.push(Segment::Expr(inner.trim().to_string()));
        } else {
            buf.push(ch);
        }
    }

    if !buf.is_empty() || segments.is_empty() {
        segments.push(Segment::Literal(buf));
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_literal() {
        assert_eq!(split_segments("hello"), vec![Segment::Literal("hello".into())]);
    }

    #[test]
    fn whole_expr() {
        assert_eq!(split_segments("${name}"), vec![Segment::Expr("name".into())]);
    }

    #[test]
    fn mixed() {
        assert_eq!(
            split_segments("Hello ${name}, count=${n}!"),
            vec![
                Segment::Literal("Hello ".into()),
                Segment::Expr("name".into()),
                Segment::Literal(", count=".into()),
                Segment::Expr("n".into()),
                Segment::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn unterminated_is_literal() {
        assert_eq!(
            split_segments("oops ${unterminated"),
            vec![Segment::Literal("oops ${unterminated".into())]
        );
    }

    #[test]
    fn empty_string_yields_one_empty_literal() {
        assert_eq!(split_segments(""), vec![Segment::Literal("".into())]);
    }
}
