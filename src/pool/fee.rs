use crate::pool::oracle::TimepointOracle;

/// Fee a freshly initialized pool starts with, hundredths of a bip.
pub const BASE_FEE: u16 = 100;

/// Hard cap on any per-direction fee rate; whatever a policy returns is
/// clamped here before use (5% in hundredths of a bip).
pub const MAX_FEE: u16 = 50_000;

/// Source of the per-direction swap fee rates.
///
/// The engine consults the policy exactly once per first-swap-of-block,
/// right after the block's timepoint slot is prepared; `timepoint_index`
/// is the most recently committed ring index, from which the oracle
/// projects values at `time`. An adaptive implementation typically
/// derives its rates from [`TimepointOracle::get_averages`]; the
/// returned pair is `(fee_zto, fee_otz)` for the two swap directions.
pub trait FeePolicy {
    fn get_fees(
        &self,
        oracle: &TimepointOracle,
        time: u32,
        tick: i32,
        timepoint_index: u16,
        liquidity: u128,
    ) -> (u16, u16);
}

/// Flat per-direction rates, for pools that opt out of dynamic pricing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedFee {
    pub fee_zto: u16,
    pub fee_otz: u16,
}

impl FixedFee {
    pub fn new(fee_zto: u16, fee_otz: u16) -> Self {
        Self { fee_zto, fee_otz }
    }
}

impl FeePolicy for FixedFee {
    fn get_fees(
        &self,
        _oracle: &TimepointOracle,
        _time: u32,
        _tick: i32,
        _timepoint_index: u16,
        _liquidity: u128,
    ) -> (u16, u16) {
        (self.fee_zto, self.fee_otz)
    }
}

/// Base rate plus a term proportional to the trailing volatility
/// average, the same rate for both directions.
///
/// `volatility_denominator` converts the oracle's per-second deviation
/// energy into fee units; larger means less sensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolatilityScaledFee {
    pub base: u16,
    pub volatility_denominator: u128,
}

impl FeePolicy for VolatilityScaledFee {
    fn get_fees(
        &self,
        oracle: &TimepointOracle,
        time: u32,
        tick: i32,
        timepoint_index: u16,
        liquidity: u128,
    ) -> (u16, u16) {
        let fee = match oracle.get_averages(time, tick, timepoint_index, liquidity) {
            Ok((volatility_average, _)) => {
                let surcharge = volatility_average / self.volatility_denominator;
                let fee = (self.base as u128).saturating_add(surcharge);
                fee.min(MAX_FEE as u128) as u16
            }
            // a pool younger than one sample has no history to price from
            Err(_) => self.base,
        };
        (fee, fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_fee_ignores_oracle_state() {
        let oracle = TimepointOracle::new();
        let policy = FixedFee::new(500, 3_000);
        assert_eq!(policy.get_fees(&oracle, 0, 0, 0, 0), (500, 3_000));
    }

    #[test]
    fn volatility_fee_grows_with_deviation_energy() {
        let mut oracle = TimepointOracle::new();
        oracle.initialize(1_000, 0);
        // tick jumps far away from the rolling average: large deviations
        let mut index = oracle.write(0, 1_100, 0, 1_000, 0).unwrap();
        index = oracle.write(index, 1_200, 10_000, 1_000, 0).unwrap();
        index = oracle.write(index, 1_300, 0, 1_000, 0).unwrap();

        let policy = VolatilityScaledFee {
            base: 100,
            volatility_denominator: 1_000,
        };
        let (calm_zto, calm_otz) = FixedFee::new(100, 100).get_fees(&oracle, 1_300, 0, index, 1_000);
        let (zto, otz) = policy.get_fees(&oracle, 1_300, 0, index, 1_000);
        assert_eq!(zto, otz);
        assert!(zto > calm_zto.max(calm_otz), "surcharge applied");
        assert!(zto <= MAX_FEE);
    }
}
