//! Legacy colour-code translation for configured messages.

/// Section sign the client renders as a formatting prefix.
pub const SECTION_SIGN: char = '§';

const CODES: &str = "0123456789abcdefklmnorx";

/// Replace `&` followed by a colour or format code with `§` and the code
/// in lower case. Any other `&` is kept.
pub fn colorize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' {
            if let Some(&code) = chars.peek() {
                let lower = code.to_ascii_lowercase();
                if CODES.contains(lower) {
                    out.push(SECTION_SIGN);
                    out.push(lower);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_codes() {
        assert_eq!(colorize("&cYou can't breathe!"), "§cYou can't breathe!");
        assert_eq!(colorize("&L&4bold red"), "§l§4bold red");
    }

    #[test]
    fn keeps_other_ampersands() {
        assert_eq!(colorize("salt & pepper"), "salt & pepper");
        assert_eq!(colorize("&z&"), "&z&");
    }
}
