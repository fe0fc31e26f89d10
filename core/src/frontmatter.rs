//! Reading and rewriting the `tags:` entry of a note's frontmatter.
//!
//! A note's frontmatter is the block at the very start of its content, opened by a
//! `---` line and closed by the next line that is exactly `---`:
//!
//! ```text
//! ---
//! title: Groceries
//! tags: [Inbox, errands]
//! ---
//! Buy milk
//! ```
//!
//! Only the first `tags:` entry is interpreted, and only in the inline list form
//! `tags: [a, b]`. The list ends at the first `]`; text after it (such as a `# comment`)
//! is kept on rewrite. Anything else after `tags:` is treated as an empty list and gets
//! overwritten by the next rewrite. Bytes outside the frontmatter block are never changed.
//!
//! Tags can't contain `,`, `[` or `]`, since those would change how the list reads back.

use std::ops::Range;

const DELIMITER: &str = "---";
const TAGS_KEY: &str = "tags:";

/// A note's content, split around its frontmatter block (if it has one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note<'a> {
    content: &'a str,
    block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    // Byte range of the lines between the delimiters, excluding the line break
    // that precedes the closing delimiter.
    body: Range<usize>,
    // Byte offset of the content following the closing `---` line.
    after: usize,
    crlf: bool,
}

/// One `tags:` key plus its continuation lines, as line indices into the body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagsEntry {
    lines: Range<usize>,
}

impl<'a> Note<'a> {
    /// Splits `content` into frontmatter and the rest. Never fails: content without a
    /// well-formed block simply has no frontmatter.
    pub fn parse(content: &'a str) -> Self {
        Note {
            content,
            block: find_block(content),
        }
    }

    pub fn has_frontmatter(&self) -> bool {
        self.block.is_some()
    }

    /// The text between the delimiters, or `None` if there is no frontmatter block.
    pub fn frontmatter(&self) -> Option<&'a str> {
        self.block.as_ref().map(|b| &self.content[b.body.clone()])
    }

    /// Everything after the frontmatter block. The whole content if there is none.
    pub fn body(&self) -> &'a str {
        match &self.block {
            Some(b) => &self.content[b.after..],
            None => self.content,
        }
    }

    /// The tags listed by the first `tags: [...]` entry. Empty if there is no such
    /// entry or it is not an inline list.
    pub fn tags(&self) -> Vec<String> {
        let Some(body) = self.frontmatter() else {
            return Vec::new();
        };
        let lines = body_lines(body);
        tags_entries(&lines)
            .first()
            .and_then(|entry| parse_inline_list(&lines[entry.lines.start][TAGS_KEY.len()..]))
            .map(|(tags, _)| tags)
            .unwrap_or_default()
    }

    /// Returns the full content with the tag list replaced by `tags`.
    ///
    /// The first `tags:` entry is replaced in place and any later ones are dropped. A
    /// block without an entry gets one appended; content without a block gets a new
    /// block prepended.
    pub fn with_tags<S: AsRef<str>>(&self, tags: &[S]) -> String {
        let line = tags_line(tags);
        let Some(block) = &self.block else {
            return format!("{DELIMITER}\n{line}\n{DELIMITER}\n{}", self.content);
        };

        let newline = if block.crlf { "\r\n" } else { "\n" };
        let body = &self.content[block.body.clone()];
        let lines = body_lines(body);
        let entries = tags_entries(&lines);

        let replacement = match entries.first() {
            Some(first) => match parse_inline_list(&lines[first.lines.start][TAGS_KEY.len()..]) {
                Some((_, trailing)) if !trailing.is_empty() => format!("{line}{trailing}"),
                _ => line.clone(),
            },
            None => line.clone(),
        };

        let mut rewritten: Vec<&str> = Vec::with_capacity(lines.len() + 1);
        match entries.first() {
            Some(first) => {
                for (idx, l) in lines.iter().enumerate() {
                    if idx == first.lines.start {
                        rewritten.push(&replacement);
                    } else if !entries.iter().any(|e| e.lines.contains(&idx)) {
                        rewritten.push(*l);
                    }
                }
            }
            None => {
                rewritten.extend(lines.iter().copied());
                rewritten.push(&line);
            }
        }

        let mut out = String::with_capacity(self.content.len() + line.len() + 2);
        out.push_str(&self.content[..block.body.start]);
        out.push_str(&rewritten.join(newline));
        if block.body.is_empty() {
            // The closing delimiter followed the opening one directly
            out.push_str(newline);
        }
        out.push_str(&self.content[block.body.end..]);
        out
    }
}

/// Whether `tag` can be written to a tag list and read back unchanged: not blank, and
/// free of `,`, `[` and `]`.
pub fn is_valid_tag(tag: &str) -> bool {
    let tag = tag.trim();
    !tag.is_empty() && !tag.contains([',', '[', ']'])
}

/// Adds `tag` to the note's tag list. Returns the new content, or `None` when the tag
/// was already listed (or is not a valid tag) and nothing needs to be written.
pub fn add_tag(content: &str, tag: &str) -> Option<String> {
    add_tags(content, &[tag])
}

/// Adds every valid tag in `tags` that isn't listed yet, in order, in a single rewrite.
pub fn add_tags<S: AsRef<str>>(content: &str, tags: &[S]) -> Option<String> {
    let note = Note::parse(content);
    let mut list = note.tags();
    let before = list.len();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if is_valid_tag(tag) && !list.iter().any(|t| t == tag) {
            list.push(tag.to_string());
        }
    }
    (list.len() != before).then(|| note.with_tags(&list))
}

/// Removes the first occurrence of `tag` from the note's tag list. Returns `None` when
/// the tag was not listed.
pub fn remove_tag(content: &str, tag: &str) -> Option<String> {
    let note = Note::parse(content);
    let mut list = note.tags();
    let tag = tag.trim();
    let idx = list.iter().position(|t| t == tag)?;
    list.remove(idx);
    Some(note.with_tags(&list))
}

/// Formats a `tags: [a, b]` line.
pub fn tags_line<S: AsRef<str>>(tags: &[S]) -> String {
    let joined = tags.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ");
    format!("{TAGS_KEY} [{joined}]")
}

fn find_block(content: &str) -> Option<Block> {
    let (body_start, crlf) = if content.starts_with("---\n") {
        (4, false)
    } else if content.starts_with("---\r\n") {
        (5, true)
    } else {
        return None;
    };

    let mut line_start = body_start;
    for line in content[body_start..].split('\n') {
        if line.strip_suffix('\r').unwrap_or(line) == DELIMITER {
            let body_end = if line_start == body_start {
                body_start
            } else {
                // Drop the line break before the closing delimiter
                let end = line_start - 1;
                if content[..end].ends_with('\r') { end - 1 } else { end }
            };
            return Some(Block {
                body: body_start..body_end.max(body_start),
                after: skip_line_break(content, line_start + DELIMITER.len()),
                crlf,
            });
        }
        line_start += line.len() + 1;
    }
    None
}

fn skip_line_break(content: &str, offset: usize) -> usize {
    let rest = &content[offset..];
    if rest.starts_with("\r\n") {
        offset + 2
    } else if rest.starts_with('\n') {
        offset + 1
    } else {
        offset
    }
}

fn body_lines(body: &str) -> Vec<&str> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

fn tags_entries(lines: &[&str]) -> Vec<TagsEntry> {
    let mut entries = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        if lines[idx].starts_with(TAGS_KEY) {
            let start = idx;
            idx += 1;
            while idx < lines.len() && is_continuation(lines[idx]) {
                idx += 1;
            }
            entries.push(TagsEntry { lines: start..idx });
        } else {
            idx += 1;
        }
    }
    entries
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t') || line.starts_with("- ") || line == "-"
}

// The tags of a `[a, b]` value and the text following its closing bracket.
fn parse_inline_list(value: &str) -> Option<(Vec<String>, &str)> {
    let (inner, trailing) = value.trim_start().strip_prefix('[')?.split_once(']')?;
    let tags = inner
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    Some((tags, trailing.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frontmatter() {
        let note = Note::parse("Buy milk");
        assert!(!note.has_frontmatter());
        assert_eq!(note.frontmatter(), None);
        assert_eq!(note.body(), "Buy milk");
        assert!(note.tags().is_empty());
    }

    #[test]
    fn test_frontmatter_must_start_at_offset_zero() {
        let note = Note::parse("\n---\ntags: [a]\n---\nbody");
        assert!(!note.has_frontmatter());
        assert!(note.tags().is_empty());

        let note = Note::parse("intro\n---\ntags: [a]\n---\n");
        assert!(!note.has_frontmatter());
    }

    #[test]
    fn test_unclosed_block_is_not_frontmatter() {
        let note = Note::parse("---\ntags: [a]\nno closing line");
        assert!(!note.has_frontmatter());
        assert!(note.tags().is_empty());
    }

    #[test]
    fn test_parse_tags() {
        let note = Note::parse("---\ntitle: x\ntags: [ a,b ,  c ]\n---\nbody\n");
        assert_eq!(note.frontmatter(), Some("title: x\ntags: [ a,b ,  c ]"));
        assert_eq!(note.tags(), vec!["a", "b", "c"]);
        assert_eq!(note.body(), "body\n");
    }

    #[test]
    fn test_empty_list_has_no_tags() {
        let note = Note::parse("---\ntags: []\n---\n");
        assert!(note.tags().is_empty());
        let note = Note::parse("---\ntags: [ , ]\n---\n");
        assert!(note.tags().is_empty());
    }

    #[test]
    fn test_only_first_tags_entry_counts() {
        let note = Note::parse("---\ntags: [a]\ntags: [b]\n---\n");
        assert_eq!(note.tags(), vec!["a"]);
    }

    #[test]
    fn test_tags_key_must_start_the_line() {
        let note = Note::parse("---\nmytags: [a]\n  tags: [b]\n---\n");
        assert!(note.tags().is_empty());
    }

    #[test]
    fn test_malformed_tags_line_reads_as_empty() {
        let note = Note::parse("---\ntags: a, b\n---\n");
        assert!(note.tags().is_empty());
        let note = Note::parse("---\ntags:\n  - a\n  - b\n---\n");
        assert!(note.tags().is_empty());
    }

    #[test]
    fn test_trailing_comment_keeps_tags() {
        let content = "---\ntags: [a, b] # keep\n---\nbody";
        assert_eq!(Note::parse(content).tags(), vec!["a", "b"]);

        let updated = add_tag(content, "Inbox").unwrap();
        assert_eq!(updated, "---\ntags: [a, b, Inbox] # keep\n---\nbody");
        assert_eq!(remove_tag(&updated, "a").unwrap(), "---\ntags: [b, Inbox] # keep\n---\nbody");
    }

    #[test]
    fn test_list_punctuation_is_not_a_tag() {
        assert!(!is_valid_tag("a,b"));
        assert!(!is_valid_tag("[x"));
        assert!(!is_valid_tag("x]"));
        assert!(is_valid_tag("nested/tag"));

        assert_eq!(add_tag("text", "a,b"), None);
        let once = add_tags("text", &["a,b", "c"]).unwrap();
        assert_eq!(once, "---\ntags: [c]\n---\ntext");
        assert_eq!(add_tags(&once, &["a,b", "c"]), None);
    }

    #[test]
    fn test_add_tag_without_frontmatter() {
        let updated = add_tag("Buy milk", "Inbox").unwrap();
        assert_eq!(updated, "---\ntags: [Inbox]\n---\nBuy milk");
    }

    #[test]
    fn test_add_tag_to_empty_content() {
        let updated = add_tag("", "Inbox").unwrap();
        assert_eq!(updated, "---\ntags: [Inbox]\n---\n");
        assert_eq!(Note::parse(&updated).tags(), vec!["Inbox"]);
    }

    #[test]
    fn test_add_tag_is_idempotent() {
        let once = add_tag("text", "x").unwrap();
        assert_eq!(add_tag(&once, "x"), None);
        assert_eq!(add_tag(&once, " x "), None);
    }

    #[test]
    fn test_add_blank_tag_is_noop() {
        assert_eq!(add_tag("text", "   "), None);
    }

    #[test]
    fn test_add_two_tags_preserves_order_and_body() {
        let original = "# Title\n\nSome text with --- inside\n---\nand a rule\n";
        let once = add_tag(original, "x").unwrap();
        let twice = add_tag(&once, "y").unwrap();

        let note = Note::parse(&twice);
        assert_eq!(note.tags(), vec!["x", "y"]);
        assert_eq!(note.body(), original);
        assert_eq!(twice.matches("tags:").count(), 1);
        assert_eq!(twice, format!("---\ntags: [x, y]\n---\n{original}"));
    }

    #[test]
    fn test_add_tag_appends_to_existing_block_without_entry() {
        let updated = add_tag("---\ntitle: Notes\n---\nbody", "B").unwrap();
        assert_eq!(updated, "---\ntitle: Notes\ntags: [B]\n---\nbody");
    }

    #[test]
    fn test_add_tag_to_empty_block() {
        let updated = add_tag("---\n---\nbody", "B").unwrap();
        assert_eq!(updated, "---\ntags: [B]\n---\nbody");
    }

    #[test]
    fn test_add_tag_replaces_entry_in_place() {
        let content = "---\ntitle: T\ntags: [a]\nauthor: me\n---\nbody";
        let updated = add_tag(content, "b").unwrap();
        assert_eq!(updated, "---\ntitle: T\ntags: [a, b]\nauthor: me\n---\nbody");
    }

    #[test]
    fn test_rewrite_overwrites_malformed_entry() {
        let content = "---\ntags:\n  - old\n  - stale\ntitle: T\n---\nbody";
        let updated = add_tag(content, "new").unwrap();
        assert_eq!(updated, "---\ntags: [new]\ntitle: T\n---\nbody");
    }

    #[test]
    fn test_rewrite_leaves_single_tags_entry() {
        let content = "---\ntags: [a]\ntitle: T\ntags: [b]\n---\n";
        let updated = add_tag(content, "c").unwrap();
        assert_eq!(updated, "---\ntags: [a, c]\ntitle: T\n---\n");
    }

    #[test]
    fn test_closing_delimiter_at_end_of_content() {
        let updated = add_tag("---\ntags: [a]\n---", "b").unwrap();
        assert_eq!(updated, "---\ntags: [a, b]\n---");
    }

    #[test]
    fn test_crlf_frontmatter() {
        let content = "---\r\ntitle: T\r\n---\r\nbody\r\n";
        let note = Note::parse(content);
        assert_eq!(note.frontmatter(), Some("title: T"));
        assert_eq!(note.body(), "body\r\n");

        let updated = add_tag(content, "a").unwrap();
        assert_eq!(updated, "---\r\ntitle: T\r\ntags: [a]\r\n---\r\nbody\r\n");
    }

    #[test]
    fn test_remove_tag() {
        let content = "---\ntags: [Inbox, work]\n---\nbody";
        let updated = remove_tag(content, "Inbox").unwrap();
        assert_eq!(updated, "---\ntags: [work]\n---\nbody");
    }

    #[test]
    fn test_remove_only_first_occurrence() {
        let updated = remove_tag("---\ntags: [a, b, a]\n---\n", "a").unwrap();
        assert_eq!(Note::parse(&updated).tags(), vec!["b", "a"]);
    }

    #[test]
    fn test_remove_last_tag_leaves_empty_list() {
        let updated = remove_tag("---\ntags: [a]\n---\nbody", "a").unwrap();
        assert_eq!(updated, "---\ntags: []\n---\nbody");
    }

    #[test]
    fn test_remove_absent_tag_is_noop() {
        assert_eq!(remove_tag("---\ntags: [a]\n---\n", "b"), None);
        assert_eq!(remove_tag("no frontmatter", "a"), None);
    }

    #[test]
    fn test_tag_matching_is_case_sensitive() {
        assert_eq!(remove_tag("---\ntags: [Inbox]\n---\n", "inbox"), None);
        let updated = add_tag("---\ntags: [Inbox]\n---\n", "inbox").unwrap();
        assert_eq!(Note::parse(&updated).tags(), vec!["Inbox", "inbox"]);
    }
}
