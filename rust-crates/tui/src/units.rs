use alloy::primitives::{
    Address,
    U256,
};
use chrono::{
    DateTime,
    Utc,
};
use generated_abi::{
    PARTICIPANT_TARGET,
    TOKEN_DECIMALS,
    token_unit,
};

pub fn format_token_amount(amount: U256) -> String {
    let unit = token_unit();
    let whole = amount / unit;
    let fractional = amount % unit;
    if fractional.is_zero() {
        format!("{whole}")
    } else {
        let digits = format!(
            "{:0>width$}",
            fractional.to::<u64>(),
            width = TOKEN_DECIMALS as usize
        );
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Formats a raw stablecoin amount rounded half-up to `places` decimals.
pub fn format_token_fixed(amount: U256, places: u32) -> String {
    let places = places.min(TOKEN_DECIMALS);
    let step = U256::from(10u64).pow(U256::from(TOKEN_DECIMALS - places));
    let half = step / U256::from(2u64);
    let rounded = (amount + half) / step;
    if places == 0 {
        return format!("{rounded}");
    }
    let scale = U256::from(10u64).pow(U256::from(places));
    let whole = rounded / scale;
    let fractional = rounded % scale;
    format!(
        "{}.{:0>width$}",
        whole,
        fractional.to::<u64>(),
        width = places as usize
    )
}

pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Share of the participant target reached so far, clamped to 100.
pub fn progress_percent(total_users: U256) -> f64 {
    let target = U256::from(PARTICIPANT_TARGET);
    if total_users >= target {
        return 100.0;
    }
    let joined: u64 = total_users.to::<u64>();
    joined as f64 / PARTICIPANT_TARGET as f64 * 100.0
}

pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = (seconds + 30) / 60;
    let distance = match minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        2..=44 => format!("{minutes} minutes"),
        45..=89 => "about 1 hour".to_string(),
        90..=1439 => format!("about {} hours", (minutes + 30) / 60),
        1440..=2519 => "1 day".to_string(),
        _ => format!("{} days", (minutes + 720) / 1440),
    };
    format!("{distance} ago")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;
    use chrono::Duration;
    use proptest::prelude::*;

    fn usdc(raw: u64) -> U256 {
        U256::from(raw)
    }

    #[test]
    fn format_token_amount__whole_fee__has_no_fraction() {
        assert_eq!(format_token_amount(usdc(100_000_000)), "100");
        assert_eq!(format_token_amount(usdc(75_000_000)), "75");
        assert_eq!(format_token_amount(U256::ZERO), "0");
    }

    #[test]
    fn format_token_amount__uses_six_decimals() {
        assert_eq!(format_token_amount(usdc(1)), "0.000001");
        assert_eq!(format_token_amount(usdc(500)), "0.0005");
        assert_eq!(format_token_amount(usdc(1_234_500)), "1.2345");
    }

    #[test]
    fn format_token_fixed__rounds_to_cents() {
        assert_eq!(format_token_fixed(usdc(70_000_000_000), 2), "70000.00");
        assert_eq!(format_token_fixed(usdc(1_234_999), 2), "1.23");
        assert_eq!(format_token_fixed(usdc(1_235_000), 2), "1.24");
        assert_eq!(format_token_fixed(usdc(999_999_999), 0), "1000");
    }

    #[test]
    fn short_address__keeps_prefix_and_suffix() {
        let addr = address!("1234567890abcdef1234567890abcdef1234abcd");
        let short = short_address(&addr);
        assert!(short.starts_with("0x1234"));
        assert!(short.to_lowercase().ends_with("...abcd"));
        assert_eq!(short.len(), 13);
    }

    #[test]
    fn progress_percent__clamps_at_target() {
        assert_eq!(progress_percent(U256::ZERO), 0.0);
        assert_eq!(progress_percent(U256::from(250u64)), 25.0);
        assert_eq!(progress_percent(U256::from(1000u64)), 100.0);
        assert_eq!(progress_percent(U256::from(5000u64)), 100.0);
    }

    #[test]
    fn relative_time__matches_expected_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "less than a minute ago");
        assert_eq!(
            relative_time(now - Duration::minutes(5), now),
            "5 minutes ago"
        );
        assert_eq!(relative_time(now - Duration::hours(3), now), "about 3 hours ago");
        assert_eq!(relative_time(now - Duration::days(4), now), "4 days ago");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 10, .. ProptestConfig::default() })]
        #[test]
        fn format_token_amount__parses_back_to_same_value(raw in any::<u64>()) {
            let formatted = format_token_amount(U256::from(raw));
            let (whole, fraction) = match formatted.split_once('.') {
                Some((w, f)) => (w.to_string(), f.to_string()),
                None => (formatted.clone(), String::new()),
            };
            prop_assert!(fraction.len() <= 6);
            prop_assert!(!fraction.ends_with('0'));
            let padded = format!("{:0<6}", fraction);
            let rebuilt: u128 =
                whole.parse::<u128>().unwrap() * 1_000_000 + padded.parse::<u128>().unwrap();
            prop_assert_eq!(rebuilt, raw as u128);
        }
    }
}
