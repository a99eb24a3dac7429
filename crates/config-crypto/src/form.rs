//! Undoing form encoding applied by HTTP clients to encrypt/decrypt bodies
//!
//! Clients frequently post raw text with a form content type, so the body
//! arrives URL-encoded with a trailing `=` (an empty form value). Cipher text
//! may legitimately end in `=` too (base64 padding), which makes stripping
//! ambiguous. The rule applied here is a heuristic, not a decoder: for
//! cipher input of odd length, if everything but the final `=` decodes as
//! hex the `=` is treated as form residue; otherwise the full string is kept
//! as base64.

use base64::Engine;

/// Strip form encoding from `data`.
///
/// Only bodies ending in `=` whose content type is not `text/plain` are
/// touched. `cipher` marks input that is cipher text rather than plaintext.
pub fn strip_form_data(data: &str, content_type: Option<&str>, cipher: bool) -> String {
    if !data.ends_with('=') || is_text_plain(content_type) {
        return data.to_string();
    }

    let mut decoded = percent_decode(data).unwrap_or_else(|| data.to_string());
    if cipher {
        // `+` in base64 became a space during form decoding
        decoded = decoded.replace(' ', "+");
    }

    if !cipher {
        // posted as a form but meant as plain text: drop the empty form value marker
        return strip_last(&decoded).to_string();
    }

    if decoded.ends_with('=') && decoded.len() % 2 == 1 {
        let candidate = strip_last(&decoded);
        if hex::decode(candidate).is_ok() {
            return candidate.to_string();
        }
        if base64::engine::general_purpose::STANDARD.decode(&decoded).is_err() {
            tracing::debug!("Cipher text is neither hex nor base64; passing it through");
        }
    }
    decoded
}

fn strip_last(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next_back();
    chars.as_str()
}

fn is_text_plain(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/plain"))
}

/// Decode `application/x-www-form-urlencoded` text.
///
/// Returns `None` on malformed escapes or when the bytes are not UTF-8.
pub fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::plain_text_untouched("foo=", Some("text/plain"), false, "foo=")]
    #[case::plain_text_with_charset("foo=", Some("text/plain; charset=UTF-8"), true, "foo=")]
    #[case::no_trailing_equals("foo%20bar", None, false, "foo%20bar")]
    #[case::form_plaintext_stripped(
        "foo=",
        Some("application/x-www-form-urlencoded"),
        false,
        "foo"
    )]
    #[case::form_plaintext_decoded("hello+world%21=", None, false, "hello world!")]
    #[case::hex_with_form_residue("abcdef01=", None, true, "abcdef01")]
    #[case::base64_padding_kept("YWJjZA==", None, true, "YWJjZA==")]
    #[case::base64_plus_restored("ab+c=", None, true, "ab+c=")]
    #[case::even_length_kept("abcdef==", None, true, "abcdef==")]
    fn strips_form_data(
        #[case] data: &str,
        #[case] content_type: Option<&str>,
        #[case] cipher: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(strip_form_data(data, content_type, cipher), expected);
    }

    #[test]
    fn hex_cipher_of_real_length_loses_only_form_residue() {
        // hex cipher text always has even length; form posting appends one `=`
        let hex_cipher = "0123456789abcdef0123456789abcdef";
        let posted = format!("{hex_cipher}=");
        assert_eq!(strip_form_data(&posted, None, true), hex_cipher);
    }

    #[test]
    fn malformed_escape_keeps_raw_text() {
        assert_eq!(percent_decode("%zz"), None);
        assert_eq!(percent_decode("%4"), None);
        assert_eq!(strip_form_data("%zz=", None, false), "%zz");
    }

    #[test]
    fn percent_decodes_utf8() {
        assert_eq!(percent_decode("caf%C3%A9").as_deref(), Some("café"));
    }
}
