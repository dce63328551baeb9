/// Turn literal `<br>` markers in an answer into line breaks.
pub fn with_breaks(text: &str) -> String {
    // Double breaks first so they become a paragraph gap
    text.replace("<br><br>", "\n\n").replace("<br>", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_double_breaks() {
        assert_eq!(with_breaks("a<br>b<br><br>c"), "a\nb\n\nc");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(with_breaks("no markup here"), "no markup here");
    }
}
