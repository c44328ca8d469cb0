//! Template syntax: literal text interleaved with `${{ path }}` expressions.
//!
//! Paths are dot-separated. Bracket lookups such as
//! `dependencies['acct/db'].interfaces.main` are accepted and normalized to
//! plain segments, quotes stripped.

use deckhand_common::config::InterpolationSettings;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_until, take_while1},
    character::complete::{char, multispace0},
    combinator::all_consuming,
    multi::many0,
    sequence::{delimited, pair, preceded},
};

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'s> {
    /// Literal text, emitted unchanged.
    Text(&'s str),
    /// An expression to resolve.
    Expression(Expression<'s>),
}

/// A parsed `${{ ... }}` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression<'s> {
    /// The expression as written, delimiters included.
    pub raw: &'s str,
    /// The normalized lookup path.
    pub path: Vec<String>,
}

impl Expression<'_> {
    /// The first path segment.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.path.first().map_or("", String::as_str)
    }

    /// The path joined with dots.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// A template that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Byte offset of the offending expression.
    pub offset: usize,
    /// What went wrong.
    pub message: String,
}

fn segment(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/')).parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_until("'"), char('\'')),
        delimited(char('"'), take_until("\""), char('"')),
    ))
    .parse(input)
}

fn bracket(input: &str) -> IResult<&str, &str> {
    delimited(
        pair(char('['), multispace0),
        alt((quoted, segment)),
        pair(multispace0, char(']')),
    )
    .parse(input)
}

fn path(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, first) = segment(input)?;
    let (input, rest) = many0(alt((preceded(char('.'), segment), bracket))).parse(input)?;
    let mut segments = Vec::with_capacity(rest.len() + 1);
    segments.push(first);
    segments.extend(rest);
    Ok((input, segments))
}

/// Parses the body of an expression into its lookup path.
///
/// # Errors
///
/// Returns a message if `body` is not a valid path.
pub fn parse_path(body: &str) -> Result<Vec<String>, String> {
    all_consuming(path)
        .parse(body.trim())
        .map(|(_, segments)| segments.into_iter().map(str::to_owned).collect())
        .map_err(|_| format!("\"{}\" is not a valid reference path", body.trim()))
}

/// Splits `text` into literal and expression segments.
///
/// An opening delimiter preceded by `$` is escaped and stays literal.
///
/// # Errors
///
/// Returns a [`SyntaxError`] for an unterminated expression or an
/// expression whose body is not a path.
pub fn parse_template<'s>(
    text: &'s str,
    settings: &InterpolationSettings,
) -> Result<Vec<Segment<'s>>, SyntaxError> {
    let open = settings.open.as_str();
    let close = settings.close.as_str();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(open) {
        let start = cursor + found;
        if text[..start].ends_with('$') {
            cursor = start + open.len();
            continue;
        }
        let body_start = start + open.len();
        let Some(body_len) = text[body_start..].find(close) else {
            return Err(SyntaxError {
                offset: start,
                message: format!("unterminated expression, expected \"{close}\""),
            });
        };
        let end = body_start + body_len + close.len();
        let path = parse_path(&text[body_start..body_start + body_len])
            .map_err(|message| SyntaxError { offset: start, message })?;
        if literal_start < start {
            segments.push(Segment::Text(&text[literal_start..start]));
        }
        segments.push(Segment::Expression(Expression {
            raw: &text[start..end],
            path,
        }));
        literal_start = end;
        cursor = end;
    }
    if literal_start < text.len() {
        segments.push(Segment::Text(&text[literal_start..]));
    }
    Ok(segments)
}

/// Returns `true` if `text` contains an expression opening delimiter.
#[must_use]
pub fn has_expression(text: &str, settings: &InterpolationSettings) -> bool {
    text.contains(settings.open.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Segment<'_>> {
        parse_template(text, &InterpolationSettings::default()).expect("should parse")
    }

    fn paths(text: &str) -> Vec<Vec<String>> {
        parse(text)
            .into_iter()
            .filter_map(|s| match s {
                Segment::Expression(e) => Some(e.path),
                Segment::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert_eq!(parse("hello"), vec![Segment::Text("hello")]);
        assert!(parse("").is_empty());
    }

    #[test]
    fn expressions_are_split_out() {
        let segments = parse("http://${{ parameters.host }}:${{parameters.port}}/");
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Text("http://"));
        let first = match &segments[1] {
            Segment::Expression(e) => e,
            Segment::Text(t) => unreachable!("expected expression, got text {t:?}"),
        };
        assert_eq!(first.raw, "${{ parameters.host }}");
        assert_eq!(first.dotted(), "parameters.host");
        assert_eq!(first.namespace(), "parameters");
        assert_eq!(segments[4], Segment::Text("/"));
    }

    #[test]
    fn bracket_lookups_are_normalized() {
        assert_eq!(
            paths("${{ dependencies['acct/db'].interfaces.main.url }}"),
            vec![vec!["dependencies", "acct/db", "interfaces", "main", "url"]]
        );
        assert_eq!(
            paths("${{ dependencies[\"acct/db\"][ 'interfaces' ].x }}"),
            vec![vec!["dependencies", "acct/db", "interfaces", "x"]]
        );
    }

    #[test]
    fn escaped_open_stays_literal() {
        assert_eq!(
            parse("$${{ not.an.expression }}"),
            vec![Segment::Text("$${{ not.an.expression }}")]
        );
    }

    #[test]
    fn unterminated_expression_is_an_error() {
        let err = parse_template("a ${{ parameters.x", &InterpolationSettings::default())
            .expect_err("should fail");
        assert_eq!(err.offset, 2);
        assert!(err.message.contains("unterminated"), "got: {}", err.message);
    }

    #[test]
    fn invalid_path_is_an_error() {
        let err = parse_template("${{ parameters..x }}", &InterpolationSettings::default())
            .expect_err("should fail");
        assert!(err.message.contains("not a valid reference path"), "got: {}", err.message);
    }

    #[test]
    fn custom_delimiters() {
        let settings = InterpolationSettings {
            open: "<%".into(),
            close: "%>".into(),
        };
        let segments = parse_template("x <% parameters.a %>", &settings).expect("should parse");
        assert_eq!(segments.len(), 2);
        assert!(has_expression("<% a %>", &settings));
        assert!(!has_expression("${{ a }}", &settings));
    }
}
