// Field segmentation: turning one raw delimited field blob into a
// front/back pair. Pure and total; every branch reports which rule fired so
// callers and tests can tell the heuristics apart.

/// Anki's field delimiter inside the `flds` column.
pub const FIELD_SEPARATOR: char = '\u{1f}';

const PARAGRAPH_JOIN: &str = "\n\n";

/// Emoji that terminate a leading question block in single-field notes.
const QUESTION_EMOJI: [&str; 6] = ["\u{1F449}", "\u{2705}", "\u{27A1}\u{FE0F}", "\u{1F4A1}", "\u{1F511}", "\u{2B50}"];

/// Minimum answer length for the `?`-split heuristic.
const MIN_ANSWER_LEN: usize = 10;

/// Which segmentation rule produced the front/back pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRule {
    /// Structured multiple-choice template (>=10 fields, answer slots populated).
    MultipleChoice,
    /// Leading question block terminated by a known emoji.
    EmojiSplit,
    /// First line vs. rest of text.
    FirstLineSplit,
    /// Text after the first `?` treated as the answer.
    QuestionMarkSplit,
    /// Single field with no usable split; back stays empty.
    SingleField,
    /// First two delimited fields taken directly.
    FieldPair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedNote {
    pub front: String,
    pub back: String,
    pub rule: SegmentRule,
}

/// Segment a raw field blob. Always returns exactly one front/back pair;
/// a blob that matches no pattern falls back to `(raw, "")`.
pub fn segment(raw_fields: &str) -> SegmentedNote {
    let fields: Vec<&str> = raw_fields.split(FIELD_SEPARATOR).collect();

    if fields.len() >= 10 {
        let populated_answers = fields[3..8].iter().filter(|f| !f.trim().is_empty()).count();
        if populated_answers >= 2 {
            return segment_multiple_choice(&fields);
        }
    }

    if fields.len() == 1 {
        return segment_single(fields[0]);
    }

    SegmentedNote {
        front: clean_field(fields[0]),
        back: clean_field(fields.get(1).copied().unwrap_or("")),
        rule: SegmentRule::FieldPair,
    }
}

/// Structured multiple-choice template: field 2 is a type tag and is skipped;
/// fields 0, 1 and the answer slots 3..=7 form the front, fields 8 and 9 the
/// explanation on the back.
fn segment_multiple_choice(fields: &[&str]) -> SegmentedNote {
    let front: Vec<String> = [0usize, 1, 3, 4, 5, 6, 7]
        .iter()
        .map(|&i| clean_field(fields[i]))
        .filter(|f| !f.is_empty())
        .collect();
    let back: Vec<String> = [8usize, 9]
        .iter()
        .map(|&i| clean_field(fields[i]))
        .filter(|f| !f.is_empty())
        .collect();

    SegmentedNote {
        front: front.join(PARAGRAPH_JOIN),
        back: back.join(PARAGRAPH_JOIN),
        rule: SegmentRule::MultipleChoice,
    }
}

fn segment_single(text: &str) -> SegmentedNote {
    for emoji in QUESTION_EMOJI {
        if let Some(idx) = text.find(emoji) {
            if idx > 0 {
                let front = clean_field(&text[..idx]);
                let back = clean_field(&text[idx..]);
                if !front.is_empty() && !back.is_empty() {
                    return SegmentedNote {
                        front,
                        back,
                        rule: SegmentRule::EmojiSplit,
                    };
                }
            }
        }
    }

    if let Some(idx) = text.find('\n') {
        let front = clean_field(&text[..idx]);
        let back = clean_field(&text[idx + 1..]);
        if !front.is_empty() && !back.is_empty() {
            return SegmentedNote {
                front,
                back,
                rule: SegmentRule::FirstLineSplit,
            };
        }
    }

    if let Some(idx) = text.find('?') {
        let rest = &text[idx + 1..];
        if rest.trim().chars().count() >= MIN_ANSWER_LEN {
            return SegmentedNote {
                front: clean_field(&text[..=idx]),
                back: clean_field(rest),
                rule: SegmentRule::QuestionMarkSplit,
            };
        }
    }

    SegmentedNote {
        front: clean_field(text),
        back: String::new(),
        rule: SegmentRule::SingleField,
    }
}

/// Decode the small fixed entity set and trim. Markup tags are preserved.
fn clean_field(field: &str) -> String {
    field
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(fields: &[&str]) -> String {
        fields.join("\u{1f}")
    }

    #[test]
    fn multiple_choice_template_concatenates_expected_slots() {
        let fields = ["Q", "stem", "tag", "A", "B", "", "", "", "why", "src"];
        let segmented = segment(&blob(&fields));

        assert_eq!(segmented.rule, SegmentRule::MultipleChoice);
        assert_eq!(segmented.front, "Q\n\nstem\n\nA\n\nB");
        assert_eq!(segmented.back, "why\n\nsrc");
    }

    #[test]
    fn multiple_choice_needs_two_populated_answers() {
        let fields = ["Q", "stem", "tag", "A", "", "", "", "", "why", "src"];
        let segmented = segment(&blob(&fields));
        // Falls through to the plain two-field mapping.
        assert_eq!(segmented.rule, SegmentRule::FieldPair);
        assert_eq!(segmented.front, "Q");
        assert_eq!(segmented.back, "stem");
    }

    #[test]
    fn two_fields_map_directly() {
        let segmented = segment(&blob(&["front side", "back side"]));
        assert_eq!(segmented.rule, SegmentRule::FieldPair);
        assert_eq!(segmented.front, "front side");
        assert_eq!(segmented.back, "back side");
    }

    #[test]
    fn single_field_emoji_split() {
        let segmented = segment("What drug class? \u{1F449} Beta blockers");
        assert_eq!(segmented.rule, SegmentRule::EmojiSplit);
        assert_eq!(segmented.front, "What drug class?");
        assert!(segmented.back.starts_with('\u{1F449}'));
    }

    #[test]
    fn single_field_newline_split() {
        let segmented = segment("First line question\nrest of the answer text");
        assert_eq!(segmented.rule, SegmentRule::FirstLineSplit);
        assert_eq!(segmented.front, "First line question");
        assert_eq!(segmented.back, "rest of the answer text");
    }

    #[test]
    fn single_field_question_mark_split_requires_long_answer() {
        let segmented = segment("Which nerve? The vagus nerve of course");
        assert_eq!(segmented.rule, SegmentRule::QuestionMarkSplit);
        assert_eq!(segmented.front, "Which nerve?");
        assert_eq!(segmented.back, "The vagus nerve of course");

        let short = segment("Which nerve? vagus");
        assert_eq!(short.rule, SegmentRule::SingleField);
        assert_eq!(short.back, "");
    }

    #[test]
    fn single_field_without_pattern_keeps_back_empty() {
        let segmented = segment("just a plain statement");
        assert_eq!(segmented.rule, SegmentRule::SingleField);
        assert_eq!(segmented.front, "just a plain statement");
        assert_eq!(segmented.back, "");
    }

    #[test]
    fn entities_decoded_and_markup_preserved() {
        let segmented = segment(&blob(&["a&nbsp;&lt;b&gt;bold&lt;/b&gt;&amp;c", "x&quot;y&#39;z"]));
        assert_eq!(segmented.front, "a <b>bold</b>&c");
        assert_eq!(segmented.back, "x\"y'z");
    }

    #[test]
    fn missing_back_padded_with_empty_string() {
        // Two delimited fields where the second is blank.
        let segmented = segment("only front\u{1f}");
        assert_eq!(segmented.rule, SegmentRule::FieldPair);
        assert_eq!(segmented.front, "only front");
        assert_eq!(segmented.back, "");
    }
}
