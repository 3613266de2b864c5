//! Ledger transfer fee schedule.

const FEE_UNIT: i64 = 2;
const FEE_MULTIPLIER: f64 = 5.0;

/// Fee in whole units for transferring `amount` whole units.
///
/// Small transfers pay a penalty of `10 - amount`, everything pays at least
/// `FEE_UNIT`, and large transfers follow a bounded `atan` curve. Amount
/// positivity is the caller's concern.
pub fn fee(amount: i64) -> i64 {
    let small_transfer_penalty = (FEE_UNIT * 5).saturating_sub(amount);
    let large_transfer_fee =
        ((amount as f64 / 150_000.0).atan() * FEE_MULTIPLIER * 33.0).floor() as i64;
    small_transfer_penalty.max(FEE_UNIT.max(large_transfer_fee))
}
