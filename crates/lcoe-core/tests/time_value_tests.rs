use lcoe_core::time_value::{irr, npv, payback_period};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// NPV
// ===========================================================================

#[test]
fn test_npv_of_level_annuity() {
    // 100 a year for 5 years at 5%: annuity factor 4.3295
    let mut flows = vec![Decimal::ZERO];
    flows.extend(std::iter::repeat(dec!(100)).take(5));
    let pv = npv(dec!(0.05), &flows).unwrap();
    assert!((pv - dec!(432.95)).abs() < dec!(0.01), "got {}", pv);
}

#[test]
fn test_npv_first_flow_undiscounted() {
    let pv = npv(dec!(0.5), &[dec!(123)]).unwrap();
    assert_eq!(pv, dec!(123));
}

#[test]
fn test_npv_empty_is_zero() {
    assert_eq!(npv(dec!(0.1), &[]).unwrap(), Decimal::ZERO);
}

// ===========================================================================
// IRR
// ===========================================================================

#[test]
fn test_irr_zeroes_npv() {
    let flows = vec![
        dec!(-4_020_000),
        dec!(600_000),
        dec!(590_000),
        dec!(580_000),
        dec!(570_000),
        dec!(560_000),
        dec!(550_000),
        dec!(540_000),
        dec!(530_000),
        dec!(520_000),
        dec!(510_000),
    ];
    let rate = irr(&flows, dec!(0.10)).unwrap();
    assert!(rate > dec!(0.05) && rate < dec!(0.10), "got {}", rate);
    assert!(npv(rate, &flows).unwrap().abs() < dec!(0.01));
}

#[test]
fn test_irr_zero_return() {
    let flows = vec![dec!(-300), dec!(100), dec!(100), dec!(100)];
    let rate = irr(&flows, dec!(0.10)).unwrap();
    assert!(rate.abs() < dec!(0.000001), "got {}", rate);
}

#[test]
fn test_irr_deeply_negative() {
    // Only 10 of 1000 returned
    let flows = vec![dec!(-1000), dec!(5), dec!(5)];
    let rate = irr(&flows, dec!(0.10)).unwrap();
    assert!(rate < dec!(-0.8), "got {}", rate);
    assert!(npv(rate, &flows).unwrap().abs() < dec!(0.001));
}

// ===========================================================================
// Payback
// ===========================================================================

#[test]
fn test_payback_exact_year() {
    let flows = vec![dec!(50), dec!(50), dec!(50)];
    assert_eq!(payback_period(dec!(100), &flows), Some(dec!(2)));
}

#[test]
fn test_payback_nothing_to_recover() {
    assert_eq!(payback_period(Decimal::ZERO, &[dec!(1)]), Some(Decimal::ZERO));
}
