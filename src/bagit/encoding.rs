use crate::bagit::consts::*;
use std::borrow::Cow;

const CR_ENCODED: &str = "%0D";
const LF_ENCODED: &str = "%0A";
const PERCENT_ENCODED: &str = "%25";

/// Percent encodes any CR, LF, or % characters in the input string
pub fn percent_encode(value: &str) -> Cow<str> {
    if let Some(i) = value.find(|c: char| c == CR || c == LF || c == '%') {
        let mut encoded = String::with_capacity(value.len() + 2);
        encoded.push_str(&value[..i]);

        for c in value[i..].chars() {
            match c {
                CR => encoded.push_str(CR_ENCODED),
                LF => encoded.push_str(LF_ENCODED),
                '%' => encoded.push_str(PERCENT_ENCODED),
                _ => encoded.push(c),
            }
        }

        Cow::Owned(encoded)
    } else {
        value.into()
    }
}

/// Reverses `percent_encode`. Only `%0D`, `%0A`, and `%25` are decoded, case insensitively; any
/// other `%` sequence is left as is.
pub fn percent_decode(value: &str) -> Cow<str> {
    if !value.contains('%') {
        return value.into();
    }

    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(i) = rest.find('%') {
        decoded.push_str(&rest[..i]);
        let candidate = rest.get(i..i + 3);

        match candidate {
            Some(c) if c.eq_ignore_ascii_case(CR_ENCODED) => decoded.push(CR),
            Some(c) if c.eq_ignore_ascii_case(LF_ENCODED) => decoded.push(LF),
            Some(c) if c.eq_ignore_ascii_case(PERCENT_ENCODED) => decoded.push('%'),
            _ => {
                decoded.push('%');
                rest = &rest[i + 1..];
                continue;
            }
        }

        rest = &rest[i + 3..];
    }

    decoded.push_str(rest);
    Cow::Owned(decoded)
}

#[cfg(test)]
mod tests {
    use crate::bagit::encoding::{percent_decode, percent_encode};

    #[test]
    fn test_percent_encoding() {
        assert_eq!(
            "a\tbc%25123%0Dqwe%0A%25%25asd%0D%0A !",
            percent_encode("a\tbc%123\rqwe\n%%asd\r\n !")
        );
        assert_eq!("nothing to see here", percent_encode("nothing to see here"));
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(
            "a\tbc%123\rqwe\n%%asd\r\n !",
            percent_decode("a\tbc%25123%0Dqwe%0a%25%25asd%0D%0A !")
        );
        assert_eq!("100%", percent_decode("100%"));
        assert_eq!("%20file", percent_decode("%20file"));
        assert_eq!("plain", percent_decode("plain"));
    }
}
