//! Fractional clock divider of one state machine.

/// Divides the system clock by `int + frac / 256`.
///
/// An integer part of 0 means 65536. Each system cycle adds 256 to an
/// accumulator; whenever it reaches the divisor the state machine gets one
/// enabled cycle and the divisor is subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Pll {
    int: u16,
    frac: u8,
    accumulator: u32,
}

impl Default for Pll {
    fn default() -> Self {
        Self::new()
    }
}

impl Pll {
    /// Divider of 1: every system cycle is enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            int: 1,
            frac: 0,
            accumulator: 0,
        }
    }

    /// Integer part as written (`0` means 65536).
    #[must_use]
    pub const fn int(&self) -> u16 {
        self.int
    }

    /// Fractional part in 1/256 units.
    #[must_use]
    pub const fn frac(&self) -> u8 {
        self.frac
    }

    /// Effective divisor in 1/256 units.
    #[must_use]
    pub const fn divisor(&self) -> u32 {
        let int = if self.int == 0 { 65_536 } else { self.int as u32 };
        int * 256 + self.frac as u32
    }

    /// Changes the divider without restarting the phase.
    ///
    /// Surplus carried over from a larger divisor is dropped, so at most one
    /// enabled cycle follows immediately.
    pub fn set_divider(&mut self, int: u16, frac: u8) {
        self.int = int;
        self.frac = frac;
        self.accumulator = self.accumulator.min(self.divisor() - 1);
    }

    /// Restarts the divider phase (`CLKDIV_RESTART`).
    pub fn restart(&mut self) {
        self.accumulator = 0;
    }

    /// Advances one system cycle and reports whether it is enabled.
    pub fn tick(&mut self) -> bool {
        self.accumulator += 256;
        let divisor = self.divisor();
        if self.accumulator >= divisor {
            self.accumulator -= divisor;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Pll;

    fn enabled_cycles(pll: &mut Pll, cycles: usize) -> usize {
        (0..cycles).filter(|_| pll.tick()).count()
    }

    #[rstest]
    #[case(1, 0, 100, 100)]
    #[case(2, 0, 100, 50)]
    #[case(4, 0, 100, 25)]
    #[case(1, 128, 300, 200)]
    #[case(2, 128, 500, 200)]
    fn divider_enables_expected_share(
        #[case] int: u16,
        #[case] frac: u8,
        #[case] cycles: usize,
        #[case] expected: usize,
    ) {
        let mut pll = Pll::new();
        pll.set_divider(int, frac);
        assert_eq!(enabled_cycles(&mut pll, cycles), expected);
    }

    #[test]
    fn zero_integer_part_means_maximum_divisor() {
        let mut pll = Pll::new();
        pll.set_divider(0, 0);
        assert_eq!(pll.divisor(), 65_536 * 256);
        assert_eq!(enabled_cycles(&mut pll, 65_535), 0);
        assert!(pll.tick());
    }

    #[test]
    fn shrinking_the_divisor_drops_surplus_phase() {
        let mut pll = Pll::new();
        pll.set_divider(100, 0);
        assert_eq!(enabled_cycles(&mut pll, 50), 0);
        pll.set_divider(2, 0);
        assert_eq!(enabled_cycles(&mut pll, 10), 5);
    }

    #[test]
    fn restart_resets_phase() {
        let mut pll = Pll::new();
        pll.set_divider(3, 0);
        assert!(!pll.tick());
        assert!(!pll.tick());
        pll.restart();
        assert!(!pll.tick());
        assert!(!pll.tick());
        assert!(pll.tick());
    }
}
