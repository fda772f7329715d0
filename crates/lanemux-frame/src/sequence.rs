//! Wraparound-aware ordering of 16-bit sequence ids.
//!
//! Ids live on a circle of 2^16 points. `a` is newer than `b` when walking
//! forward from `b` reaches `a` in fewer than 2^15 steps, so any window of
//! recent ids narrower than half the circle stays totally ordered across
//! the wrap from `u16::MAX` back to `0`.

/// Per-channel packet sequence id.
pub type SequenceId = u16;

/// Outer datagram id assigned by the connection layer.
pub type DatagramId = u16;

const HALF_RANGE: u16 = 0x8000;

/// Returns true if `a` is strictly newer than `b`.
///
/// Equal ids are never newer, which is what duplicate detection relies on.
pub fn is_sequence_newer(a: SequenceId, b: SequenceId) -> bool {
    let forward = a.wrapping_sub(b);
    forward != 0 && forward < HALF_RANGE
}

/// Forward distance from `b` to `a`, modulo 2^16.
pub fn sequence_diff(a: SequenceId, b: SequenceId) -> u16 {
    a.wrapping_sub(b)
}
