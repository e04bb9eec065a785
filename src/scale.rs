use serde::Deserialize;

use crate::CONCERT_PITCH_HZ;

/// Keyboard variants the anomaly scale can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardLayout {
    /// Standard 88-key piano, lowest key A0. Key positions span a
    /// symmetric anomaly range around zero.
    Grand88,
    /// Extended 108-key board, lowest key C0. Same key spacing, but the
    /// range is asymmetric: anomaly zero sits exactly on the A440 key.
    Extended108,
}

impl KeyboardLayout {
    pub fn key_count(&self) -> usize {
        match self {
            Self::Grand88 => 88,
            Self::Extended108 => 108,
        }
    }

    /// 1-based key number of concert pitch A440 on this keyboard.
    pub fn a440_key(&self) -> usize {
        match self {
            Self::Grand88 => 49,
            Self::Extended108 => 58,
        }
    }

    /// MIDI note number of the lowest key (A0 = 21, C0 = 12).
    pub fn midi_base(&self) -> u8 {
        match self {
            Self::Grand88 => 21,
            Self::Extended108 => 12,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Grand88 => "88-key",
            Self::Extended108 => "108-key",
        }
    }
}

/// Fixed anomaly-to-pitch mapping: evenly spaced key positions in anomaly
/// units plus the index-aligned equal-tempered frequency table. Built once
/// per run.
#[derive(Debug, Clone)]
pub struct Keyboard {
    layout: KeyboardLayout,
    positions: Vec<f64>,
    frequencies: Vec<f64>,
    step: f64,
}

impl Keyboard {
    /// Build the scale for `layout` covering `span` octaves of anomaly
    /// either side of zero.
    pub fn new(layout: KeyboardLayout, span: f64) -> Self {
        assert!(span > 0.0, "anomaly span must be positive");

        let n = layout.key_count();
        let step = 2.0 * span / (n - 1) as f64;
        let lo = match layout {
            KeyboardLayout::Grand88 => -span,
            // Pin anomaly zero onto the A440 key.
            KeyboardLayout::Extended108 => -((layout.a440_key() - 1) as f64) * step,
        };

        let positions: Vec<f64> = (0..n).map(|i| lo + i as f64 * step).collect();
        let frequencies: Vec<f64> = (1..=n)
            .map(|key| equal_tempered(key, layout.a440_key()))
            .collect();

        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));

        Self {
            layout,
            positions,
            frequencies,
            step,
        }
    }

    pub fn layout(&self) -> KeyboardLayout {
        self.layout
    }

    pub fn key_count(&self) -> usize {
        self.positions.len()
    }

    /// Anomaly value of key `index`.
    pub fn position(&self, index: usize) -> f64 {
        self.positions[index]
    }

    /// Frequency of key `index` in Hz.
    pub fn frequency(&self, index: usize) -> f64 {
        self.frequencies[index]
    }

    pub fn min_position(&self) -> f64 {
        self.positions[0]
    }

    pub fn max_position(&self) -> f64 {
        self.positions[self.positions.len() - 1]
    }

    /// Nearest key index for an anomaly value.
    ///
    /// The scale is evenly spaced, so the index is computed directly
    /// rather than scanned. Exact midpoints resolve to the lower key;
    /// values outside the scale range saturate at the boundary keys.
    pub fn nearest_key(&self, value: f64) -> usize {
        let n = self.positions.len();
        let pos = (value - self.positions[0]) / self.step;
        if pos <= 0.0 {
            return 0;
        }
        if pos >= (n - 1) as f64 {
            return n - 1;
        }

        let lower = pos.floor() as usize;
        let upper = lower + 1;
        if value - self.positions[lower] <= self.positions[upper] - value {
            lower
        } else {
            upper
        }
    }

    /// Quantize a whole series to key indices.
    pub fn quantize(&self, values: &[f64]) -> Vec<usize> {
        values.iter().map(|&v| self.nearest_key(v)).collect()
    }

    /// MIDI note number of key `index`.
    pub fn midi_note(&self, index: usize) -> u8 {
        (self.layout.midi_base() as usize + index).min(127) as u8
    }
}

/// Equal-tempered frequency of 1-based key `key`, anchored so that
/// `a440_key` sounds concert pitch: 440 · 2^((key − a440_key)/12).
fn equal_tempered(key: usize, a440_key: usize) -> f64 {
    CONCERT_PITCH_HZ * 2f64.powf((key as f64 - a440_key as f64) / 12.0)
}
