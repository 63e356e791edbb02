//! Irreversible value masking.

/// Mask a secret value, preserving only the first and last two characters.
///
/// Values of four characters or fewer are fully replaced so nothing can be
/// recovered from short secrets. Operates on characters, not bytes, so
/// multi-byte values never split a code point.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }

    let mut out = String::with_capacity(8);
    out.extend(&chars[..2]);
    out.push_str("****");
    out.extend(&chars[chars.len() - 2..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_values_fully_masked() {
        assert_eq!(mask_value(""), "****");
        assert_eq!(mask_value("x"), "****");
        assert_eq!(mask_value("abcd"), "****");
    }

    #[test]
    fn test_long_values_keep_edges() {
        assert_eq!(mask_value("abcde"), "ab****de");
        assert_eq!(mask_value("supersecretvalue"), "su****ue");
        assert_eq!(mask_value("hunter2!"), "hu****2!");
    }

    #[test]
    fn test_multibyte_values() {
        assert_eq!(mask_value("äöüäöü"), "äö****öü");
    }

    proptest! {
        #[test]
        fn prop_mask_never_exceeds_eight_chars(value in ".*") {
            let masked = mask_value(&value);
            prop_assert!(masked.chars().count() <= 8);
        }

        #[test]
        fn prop_mask_hides_interior(value in "[a-z]{5,64}") {
            let masked = mask_value(&value);
            let chars: Vec<char> = value.chars().collect();
            prop_assert_eq!(&masked[..2], value[..2].to_string());
            prop_assert!(masked.contains("****"));
            let tail: String = chars[chars.len() - 2..].iter().collect();
            prop_assert!(masked.ends_with(&tail));
        }
    }
}
