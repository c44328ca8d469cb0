//! Shell-style tokenization of command strings using `nom`.
//!
//! Splits a command such as `npm run "start server" --port $PORT` into
//! arguments. Quotes and escapes are resolved; references to declared
//! environment variables are normalized to `$NAME`; interpolation
//! expressions pass through verbatim so they survive later stages intact.

use std::collections::HashSet;

use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_till, take_until, take_while},
    character::complete::{anychar, char, multispace0, satisfy},
    combinator::{cut, recognize},
    sequence::{delimited, pair, preceded, terminated},
};

/// A tokenizer configured with interpolation delimiters and the names of
/// the environment variables the resource declares.
#[derive(Debug, Clone)]
pub struct ShellLexer<'a> {
    open: &'a str,
    close: &'a str,
    declared: HashSet<&'a str>,
}

fn failure(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}

const fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

const fn is_word_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\'' | '"' | '\\' | '$')
}

const fn is_quoted_break(c: char) -> bool {
    matches!(c, '"' | '\\' | '$')
}

/// An environment variable name.
fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_continue))).parse(input)
}

/// `'...'`, taken literally.
fn single_quoted(input: &str) -> IResult<&str, String> {
    let (input, inner) =
        preceded(char('\''), cut(terminated(take_till(|c| c == '\''), char('\'')))).parse(input)?;
    Ok((input, inner.to_owned()))
}

/// A backslash escape outside quotes: the next character, literally.
fn escaped(input: &str) -> IResult<&str, String> {
    let (input, c) = preceded(char('\\'), cut(anychar)).parse(input)?;
    Ok((input, c.to_string()))
}

/// A backslash escape inside double quotes. Only `"`, `\` and `$` are
/// special; any other pair is kept as written.
fn escaped_in_quotes(input: &str) -> IResult<&str, String> {
    let (input, c) = preceded(char('\\'), cut(anychar)).parse(input)?;
    let text = if matches!(c, '"' | '\\' | '$') {
        c.to_string()
    } else {
        format!("\\{c}")
    };
    Ok((input, text))
}

impl<'a> ShellLexer<'a> {
    /// Creates a lexer for the given interpolation delimiters.
    #[must_use]
    pub fn new(open: &'a str, close: &'a str) -> Self {
        Self {
            open,
            close,
            declared: HashSet::new(),
        }
    }

    /// Marks `names` as declared environment variables.
    #[must_use]
    pub fn with_declared(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.declared.extend(names);
        self
    }

    /// Splits `input` into arguments.
    ///
    /// # Errors
    ///
    /// Returns a message naming the column of an unterminated quote,
    /// escape or interpolation expression.
    pub fn tokenize(&self, input: &str) -> Result<Vec<String>, String> {
        self.words(input).map_err(|e| {
            let rest = match e {
                nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
                nom::Err::Incomplete(_) => "",
            };
            format!(
                "unterminated quote, escape or expression at column {} in \"{input}\"",
                input.len() - rest.len() + 1
            )
        })
    }

    fn words<'i>(&self, input: &'i str) -> Result<Vec<String>, nom::Err<nom::error::Error<&'i str>>> {
        let (mut input, _) = multispace0(input)?;
        let mut words = Vec::new();
        while !input.is_empty() {
            let (rest, word) = self.word(input)?;
            words.push(word);
            let (rest, _) = multispace0(rest)?;
            input = rest;
        }
        Ok(words)
    }

    fn word<'i>(&self, mut input: &'i str) -> IResult<&'i str, String> {
        let mut word = String::new();
        while input.chars().next().is_some_and(|c| !c.is_whitespace()) {
            let (rest, piece) = self.piece(input)?;
            word.push_str(&piece);
            input = rest;
        }
        Ok((input, word))
    }

    fn piece<'i>(&self, input: &'i str) -> IResult<&'i str, String> {
        if input.starts_with(self.open) {
            return self.expression(input);
        }
        match input.chars().next() {
            Some('\'') => single_quoted(input),
            Some('"') => self.double_quoted(input),
            Some('\\') => escaped(input),
            Some('$') => self.variable(input),
            _ => self.run(input, is_word_break),
        }
    }

    /// `${{ ... }}`, kept verbatim.
    fn expression<'i>(&self, input: &'i str) -> IResult<&'i str, String> {
        let (rest, inner) =
            preceded(tag(self.open), cut(terminated(take_until(self.close), tag(self.close))))
                .parse(input)?;
        Ok((rest, format!("{}{inner}{}", self.open, self.close)))
    }

    fn double_quoted<'i>(&self, input: &'i str) -> IResult<&'i str, String> {
        let (mut input, _) = char('"').parse(input)?;
        let mut text = String::new();
        loop {
            if let Some(rest) = input.strip_prefix('"') {
                return Ok((rest, text));
            }
            if input.is_empty() {
                return Err(failure(input));
            }
            let (rest, piece) = if input.starts_with(self.open) {
                self.expression(input)?
            } else {
                match input.chars().next() {
                    Some('\\') => escaped_in_quotes(input)?,
                    Some('$') => self.variable(input)?,
                    _ => self.run(input, is_quoted_break)?,
                }
            };
            text.push_str(&piece);
            input = rest;
        }
    }

    /// `$NAME` or `${NAME}`. Declared names come out as `$NAME`; anything
    /// else is kept exactly as written. A lone `$` is literal.
    fn variable<'i>(&self, input: &'i str) -> IResult<&'i str, String> {
        let (rest, _) = char('$').parse(input)?;
        let parsed = delimited(char('{'), name, char('}'))
            .parse(rest)
            .or_else(|_| name(rest));
        let Ok((after, var)) = parsed else {
            return Ok((rest, "$".to_owned()));
        };
        let text = if self.declared.contains(var) {
            format!("${var}")
        } else {
            input[..input.len() - after.len()].to_owned()
        };
        Ok((after, text))
    }

    /// Plain characters up to a break or the start of an expression.
    fn run<'i>(&self, input: &'i str, stop: fn(char) -> bool) -> IResult<&'i str, String> {
        let end = input
            .char_indices()
            .find(|&(idx, c)| stop(c) || input[idx..].starts_with(self.open))
            .map_or(input.len(), |(idx, _)| idx);
        if end == 0 {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::TakeWhile1,
            )));
        }
        Ok((&input[end..], input[..end].to_owned()))
    }
}
