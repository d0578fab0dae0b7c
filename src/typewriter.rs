//! Typewriter placeholder animation
//!
//! Cycles through a list of names, typing each one out a character at a time,
//! holding it, then deleting it again. Frames are produced lazily and forever;
//! the caller decides how long to play and where to draw them.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypewriterTimings {
    /// Hold after each typed character
    pub typing: Duration,
    /// Hold after each deleted character
    pub deleting: Duration,
    /// Hold once a name is fully typed
    pub pause: Duration,
}

impl Default for TypewriterTimings {
    fn default() -> Self {
        Self {
            typing: Duration::from_millis(150),
            deleting: Duration::from_millis(50),
            pause: Duration::from_millis(2000),
        }
    }
}

/// Text to show and how long to leave it up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    pub hold: Duration,
}

#[derive(Debug, Clone)]
pub struct Typewriter {
    names: Vec<String>,
    timings: TypewriterTimings,
    index: usize,
    visible: usize,
    deleting: bool,
}

impl Typewriter {
    pub fn new(names: impl IntoIterator<Item = String>, timings: TypewriterTimings) -> Self {
        Self {
            names: names.into_iter().filter(|n| !n.is_empty()).collect(),
            timings,
            index: 0,
            visible: 0,
            deleting: false,
        }
    }

    /// Frames needed to type and delete every name once
    pub fn cycle_len(&self) -> usize {
        self.names.iter().map(|n| 2 * n.chars().count()).sum()
    }
}

fn prefix(name: &str, chars: usize) -> String {
    name.chars().take(chars).collect()
}

impl Iterator for Typewriter {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let name = self.names.get(self.index)?;
        let len = name.chars().count();

        if self.deleting {
            self.visible -= 1;
            let text = prefix(name, self.visible);
            if self.visible == 0 {
                self.deleting = false;
                self.index = (self.index + 1) % self.names.len();
            }
            Some(Frame {
                text,
                hold: self.timings.deleting,
            })
        } else {
            self.visible += 1;
            let text = prefix(name, self.visible);
            let hold = if self.visible >= len {
                self.deleting = true;
                self.timings.pause
            } else {
                self.timings.typing
            };
            Some(Frame { text, hold })
        }
    }
}
