/// Six uppercase letters counting up like an odometer: AAAAAA, AAAAAB, ...
/// ZZZZZZ wraps back to AAAAAA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UppercaseSequence {
    value: Vec<u8>,
}

impl Default for UppercaseSequence {
    fn default() -> Self {
        Self::new("AAAAAA")
    }
}

impl UppercaseSequence {
    /// Start from `seed`; characters outside A-Z are replaced by `A`.
    pub fn new(seed: &str) -> Self {
        let value: Vec<u8> = seed
            .bytes()
            .map(|b| if b.is_ascii_uppercase() { b } else { b'A' })
            .collect();
        Self {
            value: if value.is_empty() { b"AAAAAA".to_vec() } else { value },
        }
    }

    /// Current value.
    pub fn value(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Advance and return the new value.
    pub fn next_value(&mut self) -> String {
        for byte in self.value.iter_mut().rev() {
            if *byte == b'Z' {
                *byte = b'A';
            } else {
                *byte += 1;
                break;
            }
        }
        self.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_counts_up() {
        let mut seq = UppercaseSequence::default();
        assert_eq!(seq.next_value(), "AAAAAB");
        assert_eq!(seq.next_value(), "AAAAAC");
    }

    #[test]
    fn test_carry() {
        let mut seq = UppercaseSequence::new("AAAAZZ");
        assert_eq!(seq.next_value(), "AAABAA");
        let mut seq = UppercaseSequence::new("ZZZZZZ");
        assert_eq!(seq.next_value(), "AAAAAA");
    }

    #[test]
    fn test_invalid_seed_characters() {
        assert_eq!(UppercaseSequence::new("ab1XYZ").value(), "AAAXYZ");
        assert_eq!(UppercaseSequence::new("").value(), "AAAAAA");
    }
}
