//! Canonical keys, key coercion and key ranges.
//!
//! Every comic and article is addressed by a [`Key`]: either a concrete
//! 1-based number or [`Key::Latest`]. User input arrives as a [`KeyInput`]
//! and is normalised by [`coerce`], which needs the current upper bound for
//! negative (from-the-end) and out-of-range numbers.

use std::fmt;
use std::iter::FusedIterator;

use crate::{Result, XkcdError};

/// Normalised identifier of a comic or article.
///
/// Ordering puts [`Key::Latest`] after every number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Number(u32),
    Latest,
}

impl Key {
    /// The concrete number, if this is not [`Key::Latest`].
    pub fn number(self) -> Option<u32> {
        match self {
            Key::Number(n) => Some(n),
            Key::Latest => None,
        }
    }

    pub fn is_latest(self) -> bool {
        matches!(self, Key::Latest)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{n}"),
            Key::Latest => f.write_str("latest"),
        }
    }
}

/// A key as supplied by a caller, before coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Latest,
    Number(i64),
    Text(String),
    Canonical(Key),
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        KeyInput::Canonical(key)
    }
}

impl From<&str> for KeyInput {
    fn from(text: &str) -> Self {
        KeyInput::Text(text.to_string())
    }
}

impl From<String> for KeyInput {
    fn from(text: String) -> Self {
        KeyInput::Text(text)
    }
}

impl<T: Into<KeyInput>> From<Option<T>> for KeyInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyInput::Latest, Into::into)
    }
}

macro_rules! key_input_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyInput {
                fn from(value: $ty) -> Self {
                    i64::try_from(value).map_or(KeyInput::Number(i64::MAX), KeyInput::Number)
                }
            }
        )*
    };
}

key_input_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// Normalises `input` into a [`Key`].
///
/// - latest and `0` become [`Key::Latest`];
/// - a canonical key is reused untouched, except `Key::Number(0)` which is
///   [`XkcdError::InvalidKey`];
/// - a negative number counts from the end (`-1` is the newest item) and
///   clamps to `1`;
/// - a positive number below `safe_below` is trusted as-is, anything else is
///   clamped to `max()`;
/// - text is parsed as a signed integer, otherwise [`XkcdError::InvalidKey`].
///
/// `max` is only called when the answer depends on it.
pub fn coerce<F>(input: KeyInput, safe_below: Option<u32>, max: F) -> Result<Key>
where
    F: FnOnce() -> Result<u32>,
{
    let number = match input {
        KeyInput::Latest => return Ok(Key::Latest),
        KeyInput::Canonical(Key::Number(0)) => return Err(XkcdError::InvalidKey("0".to_string())),
        KeyInput::Canonical(key) => return Ok(key),
        KeyInput::Number(n) => n,
        KeyInput::Text(text) => text.trim().parse::<i64>().map_err(|_| XkcdError::InvalidKey(text))?,
    };

    if number == 0 {
        return Ok(Key::Latest);
    }

    if number < 0 {
        let from_end = i64::from(max()?) + 1 + number;
        return Ok(Key::Number(u32::try_from(from_end.max(1)).unwrap_or(1)));
    }

    if let Some(threshold) = safe_below
        && number < i64::from(threshold)
    {
        return Ok(Key::Number(number as u32));
    }

    let max = max()?;
    Ok(Key::Number(u32::try_from(number).map_or(max, |n| n.min(max))))
}

/// Half-open range over concrete numbers with a signed, non-zero step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    start: i64,
    end: i64,
    step: i64,
}

impl KeyRange {
    /// Numbers from `start` towards `end` (exclusive) by `step`.
    pub fn new(start: u32, end: u32, step: i64) -> Result<Self> {
        if step == 0 {
            return Err(XkcdError::InvalidStep);
        }
        Ok(Self { start: i64::from(start), end: i64::from(end), step })
    }

    fn remaining(&self) -> usize {
        let (start, end) = (i128::from(self.start), i128::from(self.end));
        let span = if self.step > 0 { end - start } else { start - end };
        if span <= 0 {
            return 0;
        }
        let step = i128::from(self.step).abs();
        usize::try_from((span - 1) / step + 1).unwrap_or(usize::MAX)
    }
}

impl Iterator for KeyRange {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining() == 0 {
            return None;
        }
        let current = self.start;
        match current.checked_add(self.step) {
            Some(next) => self.start = next,
            // Nothing lies beyond an overflowing step.
            None => self.end = current,
        }
        u32::try_from(current).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for KeyRange {
    fn next_back(&mut self) -> Option<u32> {
        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }
        let last = i128::from(self.start) + (remaining as i128 - 1) * i128::from(self.step);
        let last = i64::try_from(last).ok()?;
        self.end = last;
        u32::try_from(last).ok()
    }
}

impl ExactSizeIterator for KeyRange {}

impl FusedIterator for KeyRange {}
