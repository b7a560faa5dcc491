//! Positional keys for manually ordered items.
//!
//! Keys are `f64`. New items go one `STEP` past the current maximum; a move
//! takes the midpoint of its neighbours. When two neighbours are too close to
//! split, the caller renumbers the list at `STEP` spacing and asks again.

pub const STEP: f64 = 1024.0;

/// Relative gap below which two keys count as exhausted.
const MIN_RELATIVE_GAP: f64 = 1e-9;

/// Where an item should land, expressed by the keys of its new neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Between { prev: f64, next: f64 },
    After { prev: f64 },
    Before { next: f64 },
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyChoice {
    Key(f64),
    /// No representable key strictly between the neighbours.
    Renumber,
    /// `prev` does not sort before `next`.
    Inverted,
}

/// Key after the current maximum (or the first key of an empty list).
pub fn append_key(max: Option<f64>) -> f64 {
    max.unwrap_or(0.0) + STEP
}

/// Key for `placement`; `max` is the list's current maximum for `End`.
pub fn key_for(placement: Placement, max: Option<f64>) -> KeyChoice {
    match placement {
        Placement::End => KeyChoice::Key(append_key(max)),
        Placement::After { prev } => KeyChoice::Key(prev + STEP),
        Placement::Before { next } => KeyChoice::Key(next - STEP),
        Placement::Between { prev, next } => between(prev, next),
    }
}

fn between(prev: f64, next: f64) -> KeyChoice {
    if prev >= next {
        return KeyChoice::Inverted;
    }
    let scale = 1f64.max(prev.abs()).max(next.abs());
    if next - prev <= MIN_RELATIVE_GAP * scale {
        return KeyChoice::Renumber;
    }
    let mid = prev + (next - prev) / 2.0;
    if mid > prev && mid < next {
        KeyChoice::Key(mid)
    } else {
        KeyChoice::Renumber
    }
}

/// Fresh evenly spaced keys for `count` items in their current order.
pub fn renumbered(count: usize) -> impl Iterator<Item = f64> {
    (1..=count).map(|i| i as f64 * STEP)
}
