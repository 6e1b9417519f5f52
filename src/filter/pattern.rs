// src/filter/pattern.rs

//! Filter tokens
//!
//! A token is parsed once into a [`Pattern`]:
//!
//! | token      | mode                 |
//! |------------|----------------------|
//! | `=name`    | exact                |
//! | `~name`    | substring            |
//! | `^name`    | prefix               |
//! | `#name`    | suffix               |
//! | `name`     | substring            |
//!
//! A `!` before or right after the sigil negates the token (`!foo`,
//! `=!foo`, `!^foo`).

use crate::error::{Error, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Substring,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub mode: MatchMode,
    pub text: String,
    pub negated: bool,
}

impl Pattern {
    pub fn parse(token: &str) -> Result<Self> {
        let mut rest = token.trim();
        let mut negated = false;

        if let Some(stripped) = rest.strip_prefix('!') {
            negated = true;
            rest = stripped;
            if rest.starts_with('!') {
                return Err(Error::filter_spec(token, "negation given twice"));
            }
        }

        let mode = match rest.chars().next() {
            Some('=') => MatchMode::Exact,
            Some('~') => MatchMode::Substring,
            Some('^') => MatchMode::Prefix,
            Some('#') => MatchMode::Suffix,
            _ => {
                return Self::finish(token, MatchMode::Substring, rest, negated);
            }
        };
        rest = &rest[1..];

        if let Some(stripped) = rest.strip_prefix('!') {
            if negated {
                return Err(Error::filter_spec(token, "negation given twice"));
            }
            negated = true;
            rest = stripped;
        }

        Self::finish(token, mode, rest, negated)
    }

    fn finish(token: &str, mode: MatchMode, text: &str, negated: bool) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::filter_spec(token, "empty pattern"));
        }
        Ok(Self {
            mode,
            text: text.to_string(),
            negated,
        })
    }

    /// Whether `value` matches the pattern text, ignoring negation
    pub fn matches(&self, value: &str) -> bool {
        match self.mode {
            MatchMode::Exact => value == self.text,
            MatchMode::Substring => value.contains(&self.text),
            MatchMode::Prefix => value.starts_with(&self.text),
            MatchMode::Suffix => value.ends_with(&self.text),
        }
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Positive tokens OR together; negated tokens always exclude
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    positive: Vec<Pattern>,
    negative: Vec<Pattern>,
}

impl PatternSet {
    /// Parse whitespace separated tokens
    pub fn parse(tokens: &str) -> Result<Self> {
        Self::from_tokens(tokens.split_whitespace())
    }

    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for token in tokens {
            let pattern = Pattern::parse(token.as_ref())?;
            if pattern.negated {
                set.negative.push(pattern);
            } else {
                set.positive.push(pattern);
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    /// Match a single value such as a package name
    ///
    /// With no positive tokens every value not excluded matches.
    pub fn matches(&self, value: &str) -> bool {
        if self.negative.iter().any(|p| p.matches(value)) {
            return false;
        }
        self.positive.is_empty() || self.positive.iter().any(|p| p.matches(value))
    }

    /// Match a collection (provides, requires, files)
    ///
    /// True when some element matches a positive token (or there are none)
    /// and no element matches a negated token.
    pub fn matches_any<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> bool {
        let mut hit = self.positive.is_empty();
        for value in values {
            if self.negative.iter().any(|p| p.matches(value)) {
                return false;
            }
            if !hit && self.positive.iter().any(|p| p.matches(value)) {
                hit = true;
            }
        }
        hit
    }
}
