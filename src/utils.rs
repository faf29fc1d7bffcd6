//! Small string helpers shared across the crate.

/// Round a canonical decimal string to `places` fractional digits,
/// half away from zero. Integers and shorter fractions are returned
/// unchanged; carries propagate into the integer part.
///
/// EG
/// round_decimal("0.125", 2) == "0.13"
/// round_decimal("9.99", 1) == "10.0"
/// round_decimal("1.5", 0) == "2"
pub fn round_decimal(lexeme: &str, places: u32) -> String {
    let places = places as usize;
    let (sign, body) = match lexeme.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", lexeme),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => return lexeme.to_string(),
    };
    if frac_part.len() <= places {
        return lexeme.to_string();
    }

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(places + 1))
        .map(|b| b - b'0')
        .collect();

    let round_up = digits.pop().unwrap_or(0) >= 5;
    if round_up {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let int_len = digits.len() - places;
    let mut out = String::from(sign);
    for (i, d) in digits.iter().enumerate() {
        if i == int_len {
            out.push('.');
        }
        out.push((b'0' + d) as char);
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}
