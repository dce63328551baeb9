use crate::state::Attachment;

const SEPARATOR: &str = "\n\n";

/// Merge typed input with the text of every pending attachment.
///
/// Returns `None` when there is nothing to send: the trimmed input is empty
/// and no attachments are pending.
pub fn compose(typed_input: &str, pending: &[Attachment]) -> Option<String> {
    let typed = typed_input.trim();
    if typed.is_empty() && pending.is_empty() {
        return None;
    }

    let segments: Vec<&str> = std::iter::once(typed)
        .filter(|s| !s.is_empty())
        .chain(pending.iter().map(|a| a.extracted_text.as_str()))
        .collect();

    Some(segments.join(SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SourceFile;

    fn attachment(name: &str, text: &str) -> Attachment {
        Attachment {
            source: SourceFile::new(name, "application/pdf", Vec::<u8>::new()),
            extracted_text: text.to_string(),
        }
    }

    #[test]
    fn test_refuse_when_nothing_to_send() {
        assert_eq!(compose("", &[]), None);
        assert_eq!(compose("  \n\t ", &[]), None);
    }

    #[test]
    fn test_typed_input_only_is_trimmed() {
        assert_eq!(compose("  Is this lease valid?  ", &[]).as_deref(), Some("Is this lease valid?"));
    }

    #[test]
    fn test_attachments_only() {
        let pending = vec![attachment("a.pdf", "First"), attachment("b.png", "Second")];
        assert_eq!(compose("   ", &pending).as_deref(), Some("First\n\nSecond"));
    }

    #[test]
    fn test_typed_input_then_attachments_in_order() {
        let pending = vec![
            attachment("a.pdf", "Clause 1"),
            attachment("b.png", "Clause 2"),
            attachment("c.pdf", "Clause 3"),
        ];
        assert_eq!(
            compose(" Summarize ", &pending).as_deref(),
            Some("Summarize\n\nClause 1\n\nClause 2\n\nClause 3")
        );
    }
}
