//! Open dictionaries of an [`ObjectsContext`](super::ObjectsContext).
//!
//! `start_dictionary` hands out a [`DictionaryContext`] token; keys are
//! written through it and it must be closed innermost first.

use crate::error::{Error, Result};
use std::collections::HashSet;

/// Handle on an open dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryContext {
    token: u64,
}

#[derive(Debug)]
struct Frame {
    token: u64,
    keys: HashSet<String>,
}

/// Stack of open dictionaries.
#[derive(Debug, Default)]
pub(crate) struct DictionaryStack {
    frames: Vec<Frame>,
    next_token: u64,
}

impl DictionaryStack {
    pub(crate) fn push(&mut self) -> DictionaryContext {
        self.next_token += 1;
        self.frames.push(Frame {
            token: self.next_token,
            keys: HashSet::new(),
        });
        DictionaryContext {
            token: self.next_token,
        }
    }

    /// Close `dict`, which must be the innermost open dictionary.
    pub(crate) fn pop(&mut self, dict: DictionaryContext) -> Result<()> {
        match self.frames.last() {
            None => Err(Error::DictionaryStackUnderflow),
            Some(frame) if frame.token != dict.token => {
                log::error!("Dictionary closed while an inner dictionary is still open");
                Err(Error::NestingViolation)
            },
            Some(_) => {
                self.frames.pop();
                Ok(())
            },
        }
    }

    /// Register `key` in `dict`; the dictionary must be innermost and the key
    /// new to it.
    pub(crate) fn add_key(&mut self, dict: &DictionaryContext, key: &str) -> Result<()> {
        let frame = match self.frames.last_mut() {
            None => return Err(Error::DictionaryStackUnderflow),
            Some(frame) if frame.token != dict.token => return Err(Error::NestingViolation),
            Some(frame) => frame,
        };
        if !frame.keys.insert(key.to_string()) {
            log::error!("Key /{} written twice into the same dictionary", key);
            return Err(Error::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_order() {
        let mut stack = DictionaryStack::default();
        let outer = stack.push();
        let inner = stack.push();
        assert!(matches!(stack.pop(outer), Err(Error::NestingViolation)));
        stack.pop(inner).unwrap();
        stack.pop(outer).unwrap();
        assert!(matches!(stack.pop(outer), Err(Error::DictionaryStackUnderflow)));
    }

    #[test]
    fn test_duplicate_keys_per_frame() {
        let mut stack = DictionaryStack::default();
        let outer = stack.push();
        stack.add_key(&outer, "A").unwrap();
        let inner = stack.push();
        stack.add_key(&inner, "A").unwrap();
        assert!(matches!(stack.add_key(&outer, "B"), Err(Error::NestingViolation)));
        assert!(matches!(stack.add_key(&inner, "A"), Err(Error::DuplicateKey(_))));
        stack.pop(inner).unwrap();
        assert!(matches!(stack.add_key(&outer, "A"), Err(Error::DuplicateKey(_))));
        assert_eq!(stack.depth(), 1);
    }
}
