//! Deterministic bit source: an 80-bit Grain-style LFSR run as a self-shrinking generator.

/// Source of single pseudorandom bits consumed by the sampler.
pub trait BitSource {
    /// Returns the next bit of the sequence.
    fn next_bit(&mut self) -> bool;
}

impl<S: BitSource + ?Sized> BitSource for &mut S {
    fn next_bit(&mut self) -> bool {
        (**self).next_bit()
    }
}

const STATE_BITS: usize = 80;
const WARM_UP_STEPS: usize = 160;
const TAPS: [usize; 5] = [13, 23, 38, 51, 62];

/// Self-shrinking generator over the 80-bit register, starting from the all-ones state.
///
/// The sequence cannot be rewound; construct a fresh stream to replay it.
#[derive(Clone, Debug)]
pub struct BitStream {
    state: [bool; STATE_BITS],
    index: usize,
}

impl BitStream {
    /// Creates the stream and discards the first 160 register updates.
    pub fn new() -> Self {
        let mut stream = Self {
            state: [true; STATE_BITS],
            index: 0,
        };
        for _ in 0..WARM_UP_STEPS {
            stream.step();
            stream.advance();
        }
        stream
    }

    /// Updates the cell at the current index from the feedback taps and returns it.
    fn step(&mut self) -> bool {
        let feedback = TAPS
            .iter()
            .fold(false, |acc, tap| acc ^ self.state[(self.index + tap) % STATE_BITS]);
        self.state[self.index] ^= feedback;
        self.state[self.index]
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % STATE_BITS;
    }
}

impl Default for BitStream {
    fn default() -> Self {
        Self::new()
    }
}

impl BitSource for BitStream {
    fn next_bit(&mut self) -> bool {
        loop {
            let choice = self.step();
            self.advance();
            let candidate = self.step();
            self.advance();
            if choice {
                return candidate;
            }
        }
    }
}

impl Iterator for BitStream {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        Some(self.next_bit())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
