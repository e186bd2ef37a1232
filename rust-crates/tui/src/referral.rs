use alloy::primitives::Address;
use url::Url;

const REF_PARAM: &str = "ref";

/// Extracts the `ref` query value from a shared link. Only values that look
/// like an address (`0x...`) are returned; full validation happens at join.
pub fn referrer_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == REF_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| value.starts_with("0x"))
}

/// Accepts either a bare value (typically an address) or a referral link.
pub fn referrer_input(arg: &str) -> Option<String> {
    let trimmed = arg.trim();
    if trimmed.starts_with("0x") {
        return Some(trimmed.to_string());
    }
    referrer_from_link(trimmed)
}

pub fn referral_link(site_url: &str, account: Address) -> String {
    match Url::parse(site_url) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .clear()
                .append_pair(REF_PARAM, &account.to_string());
            url.to_string()
        }
        Err(_) => format!("{}?{REF_PARAM}={account}", site_url.trim_end_matches('?')),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn account() -> Address {
        Address::repeat_byte(0xAB)
    }

    #[test]
    fn referrer_from_link__reads_ref_param() {
        let link = "https://fortune-skylines.xyz/?utm=x&ref=0x1111111111111111111111111111111111111111";
        assert_eq!(
            referrer_from_link(link).as_deref(),
            Some("0x1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn referrer_from_link__ignores_non_address_values() {
        assert_eq!(referrer_from_link("https://a.xyz/?ref=alice"), None);
        assert_eq!(referrer_from_link("https://a.xyz/"), None);
        assert_eq!(referrer_from_link("not a url"), None);
    }

    #[test]
    fn referrer_input__accepts_bare_address() {
        assert_eq!(referrer_input(" 0xabc ").as_deref(), Some("0xabc"));
    }

    #[test]
    fn referral_link__round_trips_through_parser() {
        // given
        let link = referral_link("http://localhost:3000", account());

        // when
        let parsed = referrer_from_link(&link).unwrap();

        // then
        assert!(link.starts_with("http://localhost:3000/?ref=0x"));
        assert_eq!(parsed, account().to_string());
    }
}
