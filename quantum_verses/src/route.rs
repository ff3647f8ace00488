//! Verse identifiers, deep links and navigation history
//!
//! A route is the addressable form of the current selection, written as a
//! query string (`?verse=7`). The host shows it in the window title and
//! accepts it on the command line.

use crate::error::{Result, VerseError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VerseId(pub u32);

impl fmt::Display for VerseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Verse {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub verse: VerseId,
}

impl Route {
    pub fn new(verse: VerseId) -> Self {
        Self { verse }
    }

    /// Accepts `?verse=7`, `verse=7&x=y`, `#verse=7` or a bare `7`
    pub fn parse(link: &str) -> Result<Self> {
        let trimmed = link.trim().trim_start_matches(['?', '#']);
        if let Ok(n) = trimmed.parse::<u32>() {
            return Ok(Self::new(VerseId(n)));
        }
        trimmed
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "verse")
            .and_then(|(_, value)| value.parse::<u32>().ok())
            .map(|n| Self::new(VerseId(n)))
            .ok_or_else(|| VerseError::Route(link.to_string()))
    }

    pub fn to_query(&self) -> String {
        format!("?verse={}", self.verse.0)
    }
}

/// Back/forward stack of visited verses
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<VerseId>,
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh navigation, dropping any forward entries
    pub fn push(&mut self, id: VerseId) {
        if self.current() == Some(id) {
            return;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(id);
        self.cursor = self.entries.len() - 1;
    }

    pub fn current(&self) -> Option<VerseId> {
        self.entries.get(self.cursor).copied()
    }

    pub fn back(&mut self) -> Option<VerseId> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    pub fn forward(&mut self) -> Option<VerseId> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_link_forms() {
        for link in ["?verse=7", "verse=7", "#verse=7", "7", "?lang=en&verse=7"] {
            assert_eq!(Route::parse(link).unwrap().verse, VerseId(7), "{link}");
        }
        assert!(Route::parse("?chapter=2").is_err());
        assert!(Route::parse("?verse=seven").is_err());
    }

    #[test]
    fn query_round_trips() {
        let route = Route::new(VerseId(12));
        assert_eq!(Route::parse(&route.to_query()).unwrap(), route);
    }

    #[test]
    fn history_back_and_forward() {
        let mut history = History::new();
        history.push(VerseId(1));
        history.push(VerseId(2));
        history.push(VerseId(3));
        assert_eq!(history.back(), Some(VerseId(2)));
        assert_eq!(history.back(), Some(VerseId(1)));
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), Some(VerseId(2)));

        // New navigation drops the forward branch
        history.push(VerseId(5));
        assert_eq!(history.forward(), None);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn repeated_push_is_ignored() {
        let mut history = History::new();
        history.push(VerseId(4));
        history.push(VerseId(4));
        assert_eq!(history.len(), 1);
    }
}
