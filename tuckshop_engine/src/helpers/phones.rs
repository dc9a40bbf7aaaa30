use regex::Regex;

/// Checks a customer phone number against the local mobile numbering plan before it is sent to the mobile-money
/// provider: ten digits, starting 077 or 078. The provider rejects anything else anyway, but rejecting it here
/// keeps a doomed charge from ever being initiated.
pub fn is_valid_mobile_number(phone: &str) -> bool {
    let re = Regex::new(r"^(077|078)\d{7}$").unwrap();
    re.is_match(phone)
}
