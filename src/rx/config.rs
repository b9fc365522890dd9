//! The decoder-side configuration snapshot, rebuilt from CVs whenever one
//! of the config-relevant CVs changes.

use crate::address::{Address, AddressType};
use crate::addresses::Addresses;

/// CV numbers (1-indexed, as printed on a throttle) whose write should
/// trigger [`Config::reload`]. 0-indexed internally as `{0, 14, 15, 16, 17,
/// 18, 19, 27, 28}`.
pub const RELOAD_ON_CV_WRITE: [u8; 9] = [1, 15, 16, 17, 18, 19, 20, 28, 29];

/// Returns whether a (1-indexed) CV address should trigger a config reload.
pub fn triggers_reload(cv_addr_1_indexed: u32) -> bool {
    RELOAD_ON_CV_WRITE
        .iter()
        .any(|&cv| cv as u32 == cv_addr_1_indexed)
}

/// Snapshot of the CVs that shape how the dispatcher interprets packets.
/// Rebuilt by [`Config::reload`] whenever a CV in [`RELOAD_ON_CV_WRITE`] is
/// written.
#[derive(Debug, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Legacy F0 exception: CV29 bit 1 clear means the speed byte's bit 4
    /// toggles F0 rather than being the 5th speed-step bit.
    pub f0_exception: bool,
    /// CV15 != CV16 and both nonzero: CV writes are rejected save CV15.
    pub cvs_locked: bool,
    /// CV29 bit 3: the decoder answers BiDi cut-out channel 2.
    pub bidi_enabled: bool,
    /// CV20 bit 7: channel 2 additionally answers for the consist address.
    pub consist_answers_channel2: bool,
    /// Whether CV19 names an active consist address (nonzero low 7 bits).
    pub has_consist: bool,
}

/// Host hooks needed to (re)build a [`Config`]/[`Addresses`] snapshot from
/// CVs. Implemented by the same type that implements
/// [`super::dispatcher::Decoder`].
pub trait CvSource {
    fn read_cv(&mut self, cv_addr_0_indexed: u32) -> u8;
}

impl Config {
    /// Rebuild `self` and `addrs` from CVs 1, 15-20, 28, 29.
    pub fn reload(&mut self, addrs: &mut Addresses, host: &mut impl CvSource) {
        let cv29 = host.read_cv(29 - 1);
        let long_address_enabled = cv29 & (1 << 5) != 0;
        addrs.primary = if long_address_enabled {
            let hi = host.read_cv(17 - 1);
            let lo = host.read_cv(18 - 1);
            Address::new((((hi as u16) << 8) | lo as u16) & 0x3FFF, AddressType::Long)
        } else {
            let cv1 = host.read_cv(1 - 1);
            Address::new(cv1 as u16, AddressType::Short)
        };
        addrs.primary.reversed = cv29 & 1 != 0;

        let cv19 = host.read_cv(19 - 1);
        let cv20 = host.read_cv(20 - 1);
        self.has_consist = cv19 & 0x7F != 0 || cv20 & 0x7F != 0;
        let consist_addr = 100u16 * (cv20 & 0x7F) as u16 + (cv19 & 0x7F) as u16;
        addrs.consist = if self.has_consist {
            Address::new(consist_addr, AddressType::Long)
        } else {
            Address::new(0, AddressType::UnknownService)
        };
        addrs.consist.reversed = cv19 & (1 << 7) != 0;

        self.f0_exception = cv29 & (1 << 1) == 0;

        let cv15 = host.read_cv(15 - 1);
        let cv16 = host.read_cv(16 - 1);
        self.cvs_locked = cv15 != cv16 && cv15 != 0 && cv16 != 0;

        self.bidi_enabled = cv29 & (1 << 3) != 0;
        self.consist_answers_channel2 = cv20 & (1 << 7) != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCvs([u8; 32]);
    impl CvSource for FakeCvs {
        fn read_cv(&mut self, cv_addr_0_indexed: u32) -> u8 {
            self.0[cv_addr_0_indexed as usize]
        }
    }

    #[test]
    fn short_address_path_reads_cv1() {
        let mut cvs = FakeCvs([0; 32]);
        cvs.0[0] = 42; // CV1
        let mut addrs = Addresses::default();
        let mut cfg = Config::default();
        cfg.reload(&mut addrs, &mut cvs);
        assert_eq!(addrs.primary.value, 42);
        assert_eq!(addrs.primary.r#type, AddressType::Short);
    }

    #[test]
    fn long_address_path_reads_cv17_cv18_when_cv29_bit5_set() {
        let mut cvs = FakeCvs([0; 32]);
        cvs.0[28] = 1 << 5; // CV29
        cvs.0[16] = 0b1100_0001; // CV17
        cvs.0[17] = 0x23; // CV18
        let mut addrs = Addresses::default();
        let mut cfg = Config::default();
        cfg.reload(&mut addrs, &mut cvs);
        assert_eq!(addrs.primary.r#type, AddressType::Long);
        assert_eq!(addrs.primary.value, 0x0123);
    }

    #[test]
    fn triggers_reload_matches_the_named_cv_set() {
        assert!(triggers_reload(1));
        assert!(triggers_reload(29));
        assert!(!triggers_reload(2));
        assert!(!triggers_reload(30));
    }
}
