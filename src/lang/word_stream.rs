// =============================================================================
// WORD STREAM - lazy token source
// =============================================================================

/// A finite, restartable source of lowercase tokens with comments already
/// stripped. The compiler driver pulls one token at a time and never looks
/// ahead by more than one.
pub trait WordStream {
    fn next_word(&mut self) -> Option<String>;

    /// Rewind to the first token.
    #[allow(dead_code)]
    fn rewind(&mut self);
}

/// Token source over aggregated source text. Lowercases on construction,
/// strips `//` comments to end of line, splits on whitespace.
pub struct SourceStream {
    source: Vec<char>,
    pos: usize,
}

impl SourceStream {
    pub fn new(source: &str) -> Self {
        SourceStream {
            source: source.to_lowercase().chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn skip_blank(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.pos += 1;
            } else if ch == '/' && self.peek() == Some('/') {
                while let Some(ch) = self.current() {
                    if ch == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }
}

impl WordStream for SourceStream {
    fn next_word(&mut self) -> Option<String> {
        self.skip_blank();
        let mut word = String::new();
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                break;
            }
            word.push(ch);
            self.pos += 1;
        }
        if word.is_empty() { None } else { Some(word) }
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }
}
