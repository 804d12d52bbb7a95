use crate::error::Error;
use crate::lexer::cursor::Cursor;
use crate::lexer::{is_id, is_whitespace};
use crate::symbol::LabelTable;

/// A program with its label definitions stripped off.
#[derive(Debug)]
pub struct Preprocessed<'a> {
    pub labels: LabelTable,
    /// Instruction-only remainder of each line, one per input line
    pub lines: Vec<&'a str>,
}

/// Collect `Label:` prefixes into a label table and strip them from their lines.
///
/// A label is an identifier at the start of a line (after optional whitespace) that is
/// immediately followed by `:`. Lines without one are returned unchanged apart from trimming.
pub fn preprocess<S: AsRef<str>>(program: &[S]) -> Result<Preprocessed<'_>, Error> {
    let mut labels = LabelTable::new();
    let mut lines = Vec::with_capacity(program.len());
    for (idx, line) in program.iter().enumerate() {
        let line = line.as_ref();
        let rest = match split_label(line) {
            Some((name, rest)) => {
                labels.insert(name, idx)?;
                rest
            }
            None => line,
        };
        lines.push(rest.trim());
    }
    Ok(Preprocessed { labels, lines })
}

/// Split `name: rest` into its parts, or `None` if the line carries no label.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let mut cur = Cursor::new(line);
    cur.take_while(is_whitespace);
    cur.reset_pos();
    if !cur.first().is_ascii_alphabetic() {
        return None;
    }
    cur.take_while(is_id);
    let name = cur.token_text();
    cur.rest().strip_prefix(':').map(|rest| (name, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_LABELS;

    #[test]
    fn strips_labels() {
        let program = [
            "\t\t\tLOAD R1, =0",
            "Label: \tBGEQ R1, R2, Label2",
            "\t\t\tINC R1",
            "Label2:\tBR Label",
            "HALT",
        ];
        let pre = preprocess(&program).unwrap();
        assert_eq!(
            pre.lines,
            vec!["LOAD R1, =0", "BGEQ R1, R2, Label2", "INC R1", "BR Label", "HALT"]
        );
        assert_eq!(pre.labels.len(), 2);
        assert_eq!(pre.labels.line_of("Label"), Some(1));
        assert_eq!(pre.labels.line_of("Label2"), Some(3));
    }

    #[test]
    fn label_only_and_empty_lines() {
        let pre = preprocess(&["start:", "", "  end:   ; trailing comment"]).unwrap();
        assert_eq!(pre.lines, vec!["", "", "; trailing comment"]);
        assert_eq!(pre.labels.line_of("start"), Some(0));
        assert_eq!(pre.labels.line_of("end"), Some(2));
    }

    #[test]
    fn colon_must_follow_immediately() {
        let pre = preprocess(&["loop :INC R1", "BR loop"]).unwrap();
        assert!(pre.labels.is_empty());
        assert_eq!(pre.lines[0], "loop :INC R1");
    }

    #[test]
    fn no_label_without_identifier() {
        assert_eq!(split_label(":HALT"), None);
        assert_eq!(split_label("12: HALT"), None);
        assert_eq!(split_label("a_1:HALT"), Some(("a_1", "HALT")));
    }

    #[test]
    fn duplicate_label() {
        let err = preprocess(&["a: INC R1", "a: HALT"]).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateLabel {
                name: "a".into(),
                line: 1
            }
        );
    }

    #[test]
    fn too_many_labels() {
        let program: Vec<String> = (0..=MAX_LABELS).map(|i| format!("l{i}: HALT")).collect();
        assert_eq!(
            preprocess(&program).unwrap_err(),
            Error::TooManyLabels { limit: MAX_LABELS }
        );
        assert!(preprocess(&program[..MAX_LABELS]).is_ok());
    }
}
