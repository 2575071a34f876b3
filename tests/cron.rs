//! Cron matcher behavior across the five-field grammar.

use chrono::{Local, TimeZone};
use iosans::cron;

fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[test]
fn quarter_hour_step_matches() {
    assert!(cron::matches("*/15 * * * *", local(2025, 1, 1, 10, 30)));
    assert!(!cron::matches("*/15 * * * *", local(2025, 1, 1, 10, 20)));
}

#[test]
fn weekday_mornings() {
    // 2025-01-04 is a Saturday; 2025-01-06 is a Monday.
    assert!(!cron::matches("0 9 * * 1-5", local(2025, 1, 4, 9, 0)));
    assert!(cron::matches("0 9 * * 1-5", local(2025, 1, 6, 9, 0)));
}

#[test]
fn step_field_matches_every_matching_minute_of_an_hour() {
    for minute in 0..60 {
        let expected = minute % 15 == 0;
        assert_eq!(
            cron::matches("*/15 * * * *", local(2025, 7, 9, 13, minute)),
            expected,
            "minute {minute}"
        );
    }
}

#[test]
fn day_of_month_and_month_fields() {
    assert!(cron::matches("30 6 1 1 *", local(2025, 1, 1, 6, 30)));
    assert!(!cron::matches("30 6 1 1 *", local(2025, 2, 1, 6, 30)));
    assert!(cron::matches("0 0 1-7 * *", local(2025, 5, 3, 0, 0)));
    assert!(!cron::matches("0 0 1-7 * *", local(2025, 5, 8, 0, 0)));
}

#[test]
fn sunday_is_zero() {
    // 2025-01-05 is a Sunday.
    assert!(cron::matches("* * * * 0", local(2025, 1, 5, 11, 11)));
    assert!(!cron::matches("* * * * 0", local(2025, 1, 6, 11, 11)));
}

#[test]
fn malformed_expressions_never_match() {
    let at = local(2025, 1, 1, 0, 0);
    for expr in [
        "",
        "*",
        "* * * * * *",
        "60 * * * *",
        "* 24 * * *",
        "* * 0 * *",
        "* * * 13 *",
        "* * * * 9",
        "*/x * * * *",
        "1-0 * * * *",
    ] {
        assert!(!cron::matches(expr, at), "{expr:?} should not match");
    }
}

#[test]
fn validate_distinguishes_good_from_bad() {
    assert!(cron::validate("*/5 8-18 * * 1-5").is_ok());
    assert!(cron::validate("0,15,30,45 * * * *").is_ok());
    assert!(cron::validate("five * * * *").is_err());
}
