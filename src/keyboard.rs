use serde::{Deserialize, Serialize};

/// Black keys within one 12-key octave, counted from key 0.
const BLACK_IN_OCTAVE: [bool; 12] = [
    false, true, false, true, false, false, true, false, true, false, true, false,
];

/// Static key geometry for the 88-key background. Indices are key-space
/// positions 0..=88; the pattern repeats every 12 keys starting at key 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardLayout {
    pub white_keys: Vec<u32>,
    pub black_keys: Vec<u32>,
}

impl KeyboardLayout {
    pub fn new() -> Self {
        let (black, white): (Vec<u32>, Vec<u32>) =
            (0..=88u32).partition(|&k| is_black_key(k));
        Self {
            white_keys: white,
            black_keys: black,
        }
    }
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_black_key(key: u32) -> bool {
    BLACK_IN_OCTAVE[(key % 12) as usize]
}
