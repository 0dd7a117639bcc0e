use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Ordering;

use crate::error::LcoeError;
use crate::types::{Money, Rate};
use crate::LcoeResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const RATE_TOLERANCE: Decimal = dec!(0.000000000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;

const NEWTON_MIN_RATE: Decimal = dec!(-0.99);
const NEWTON_MAX_RATE: Decimal = dec!(100);
/// Search range on the growth factor `1 + r`, i.e. rates in (-0.999999, 1e6].
const MIN_GROWTH: Decimal = dec!(0.000001);
const MAX_GROWTH: Decimal = dec!(1000001);
/// Ratio between neighbouring growth factors tried while bracketing.
const BRACKET_STEP: Decimal = dec!(1.1);

/// Net Present Value of a series of cash flows, the first flow undiscounted.
///
/// Evaluated with Horner's scheme on the discount factor `1 / (1 + rate)` so
/// no explicit powers are formed.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> LcoeResult<Money> {
    if rate <= dec!(-1) {
        return Err(LcoeError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_with_slope(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| LcoeError::InvalidInput {
            field: "rate".into(),
            reason: format!("Discounting at {rate} overflows the decimal range"),
        })
}

/// Internal Rate of Return.
///
/// Newton-Raphson from `guess`; if that stalls or leaves the representable
/// range, falls back to bisection on the sign change nearest `guess`.
/// Series with several sign changes can have several roots; the one found
/// is the one closest to `guess` on the growth-factor grid.
pub fn irr(cash_flows: &[Money], guess: Rate) -> LcoeResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(LcoeError::InvalidInput {
            field: "cash_flows".into(),
            reason: "IRR requires at least 2 cash flows".into(),
        });
    }

    let mut rate = guess.max(NEWTON_MIN_RATE).min(NEWTON_MAX_RATE);

    for _ in 0..MAX_IRR_ITERATIONS {
        let Some((npv_val, slope)) = npv_with_slope(rate, cash_flows) else {
            break;
        };

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if slope.is_zero() {
            break;
        }

        let Some(step) = npv_val.checked_div(slope) else {
            break;
        };
        let Some(next) = rate.checked_sub(step) else {
            break;
        };

        // Guard against divergence
        rate = next.max(NEWTON_MIN_RATE).min(NEWTON_MAX_RATE);

        if step.abs() < RATE_TOLERANCE {
            return Ok(rate);
        }
    }

    tracing::trace!(guess = %guess, "Newton IRR did not settle, bisecting");
    bisect_irr(cash_flows, guess)
}

/// Years until cumulative inflows repay `initial_outlay`, interpolated within
/// the recovery year. `None` if the outlay is never recovered.
pub fn payback_period(initial_outlay: Money, inflows: &[Money]) -> Option<Decimal> {
    if initial_outlay <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }

    let mut cumulative = Decimal::ZERO;
    for (i, flow) in inflows.iter().enumerate() {
        let prev_cumulative = cumulative;
        cumulative += flow;
        if cumulative >= initial_outlay {
            let needed = initial_outlay - prev_cumulative;
            let fraction = if *flow > Decimal::ZERO {
                needed / flow
            } else {
                Decimal::ZERO
            };
            return Some(Decimal::from(i as u64) + fraction);
        }
    }

    None
}

/// NPV and its derivative with respect to the rate, or `None` on overflow.
///
/// With `x = 1 / (1 + r)`, NPV is the polynomial `P(x) = sum(cf_t * x^t)`
/// and `dNPV/dr = -x^2 * P'(x)`; both come out of one Horner pass.
fn npv_with_slope(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let x = Decimal::ONE.checked_div(one_plus_r)?;

    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;
    for cf in cash_flows.iter().rev() {
        derivative = derivative.checked_mul(x)?.checked_add(value)?;
        value = value.checked_mul(x)?.checked_add(*cf)?;
    }

    let slope = -(x.checked_mul(x)?.checked_mul(derivative)?);
    Some((value, slope))
}

/// Sign of the NPV at `rate`, for any rate above -100%.
///
/// Discounts backwards when `1 + r >= 1` and compounds forwards otherwise, so
/// every multiplier is at most one and the accumulator cannot overflow.
/// Compounding to the horizon scales the NPV by a positive factor, which
/// leaves its sign unchanged.
fn npv_sign(rate: Rate, cash_flows: &[Money]) -> Ordering {
    let growth = Decimal::ONE + rate;
    let mut acc = Decimal::ZERO;

    if growth >= Decimal::ONE {
        let x = Decimal::ONE / growth;
        for cf in cash_flows.iter().rev() {
            acc = acc * x + *cf;
        }
    } else {
        for cf in cash_flows {
            acc = acc * growth + *cf;
        }
    }

    acc.cmp(&Decimal::ZERO)
}

/// Walk outwards from `guess` in geometric steps of the growth factor until
/// the NPV changes sign. Returns `(lo, hi)` with `lo < hi`, or a single root
/// hit exactly as `(r, r)`.
fn bracket_root(cash_flows: &[Money], guess: Rate) -> Option<(Rate, Rate)> {
    let seed = (Decimal::ONE + guess).max(MIN_GROWTH).min(MAX_GROWTH);
    let seed_sign = npv_sign(seed - Decimal::ONE, cash_flows);
    if seed_sign == Ordering::Equal {
        return Some((seed - Decimal::ONE, seed - Decimal::ONE));
    }

    let mut up = seed;
    let mut down = seed;
    loop {
        let mut moved = false;

        if up < MAX_GROWTH {
            let next = (up * BRACKET_STEP).min(MAX_GROWTH);
            if npv_sign(next - Decimal::ONE, cash_flows) != seed_sign {
                return Some((up - Decimal::ONE, next - Decimal::ONE));
            }
            up = next;
            moved = true;
        }

        if down > MIN_GROWTH {
            let next = (down / BRACKET_STEP).max(MIN_GROWTH);
            if npv_sign(next - Decimal::ONE, cash_flows) != seed_sign {
                return Some((next - Decimal::ONE, down - Decimal::ONE));
            }
            down = next;
            moved = true;
        }

        if !moved {
            return None;
        }
    }
}

fn bisect_irr(cash_flows: &[Money], guess: Rate) -> LcoeResult<Rate> {
    let Some((mut lo, mut hi)) = bracket_root(cash_flows, guess) else {
        return Err(LcoeError::ConvergenceFailure {
            function: "IRR bracket".into(),
            iterations: 0,
            last_delta: npv(guess, cash_flows).unwrap_or(Decimal::MAX),
        });
    };

    let lo_sign = npv_sign(lo, cash_flows);
    if lo_sign == Ordering::Equal {
        return Ok(lo);
    }

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let sign = npv_sign(mid, cash_flows);
        if sign == Ordering::Equal || hi - lo < RATE_TOLERANCE {
            return Ok(mid);
        }
        if sign == lo_sign {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Err(LcoeError::ConvergenceFailure {
        function: "IRR bisection".into(),
        iterations: MAX_BISECTION_ITERATIONS,
        last_delta: hi - lo,
    })
}
