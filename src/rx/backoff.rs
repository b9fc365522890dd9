//! O(2^n) backoff used to stagger BiDi responses (and logon self-selection)
//! across decoders that would otherwise answer in the same cut-out.

use rand_core::RngCore;

fn random_count(range: u8, rng: &mut impl RngCore) -> u8 {
    (rng.next_u32() % (8u32 << range)) as u8
}

/// Backoff for ordinary BiDi responses (POM echoes, tip-off search, ...).
///
/// [`Backoff::tick`] returns `true` every call until the backoff counter
/// runs out, at which point it draws a new, wider random count and returns
/// `false` for that call. Callers send on `true`, skip on `false`.
#[derive(Debug, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Backoff {
    range: u8,
    count: u8,
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, rng: &mut impl RngCore) -> bool {
        if self.count != 0 {
            self.count -= 1;
            true
        } else {
            self.count = random_count(self.range, rng);
            self.range = (self.range + 1).min(3);
            false
        }
    }

    /// Don't back off on the next call.
    pub fn now(&mut self) {
        self.range = 0;
        self.count = 0;
    }
}

/// Backoff for automatic-logon self-selection (RCN-218), seeded with a
/// nonzero initial count so a freshly-powered decoder doesn't race every
/// other decoder on the bus for the very first opportunity.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogonBackoff {
    range: u8,
    count: u8,
}

impl LogonBackoff {
    pub fn new(rng: &mut impl RngCore) -> Self {
        LogonBackoff {
            range: 0,
            count: random_count(0, rng),
        }
    }

    pub fn tick(&mut self, rng: &mut impl RngCore) -> bool {
        if self.count != 0 {
            self.count -= 1;
            true
        } else {
            self.count = random_count(self.range, rng);
            self.range = (self.range + 1).min(3);
            false
        }
    }

    /// Don't back off on the next call.
    pub fn now(&mut self) {
        self.count = 0;
    }

    /// Reset to a fresh random count at range 0.
    pub fn reset(&mut self, rng: &mut impl RngCore) {
        self.range = 0;
        self.count = random_count(0, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[test]
    fn now_forces_an_immediate_yield_then_a_non_yield() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut b = Backoff::new();
        b.now();
        assert!(!b.tick(&mut rng));
    }

    #[test]
    fn range_widens_up_to_a_cap_of_three() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut b = Backoff::new();
        for _ in 0..50 {
            while b.tick(&mut rng) {}
        }
        assert!(b.range <= 3);
    }

    #[test]
    fn logon_backoff_starts_with_a_nonzero_range_zero_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let b = LogonBackoff::new(&mut rng);
        assert_eq!(b.range, 0);
    }
}
