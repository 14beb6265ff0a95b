//! Provider-configuration resource parsing.

/// Implementation names declared by one provider-configuration resource.
///
/// One name per line; anything after `comment_marker` is ignored, as are
/// surrounding whitespace and blank lines. Names already present in `seen`
/// are skipped, so the first declaration wins.
pub(crate) fn parse_into(content: &str, comment_marker: char, seen: &mut Vec<String>) {
    for line in content.lines() {
        let line = match line.find(comment_marker) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let name = line.trim();
        if name.is_empty() || seen.iter().any(|s| s == name) {
            continue;
        }
        seen.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_blank_lines_and_duplicates() {
        let content = "# plugins\n\ncom.x.Impl2\n  com.x.Impl1  # trailing\ncom.x.Impl2\n";
        let mut names = Vec::new();
        parse_into(content, '#', &mut names);
        assert_eq!(names, vec!["com.x.Impl2", "com.x.Impl1"]);
    }

    #[test]
    fn later_resources_append_in_discovery_order() {
        let mut names = Vec::new();
        parse_into("a.B\nc.D", '#', &mut names);
        parse_into("c.D\ne.F", '#', &mut names);
        assert_eq!(names, vec!["a.B", "c.D", "e.F"]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut names = Vec::new();
        parse_into("a.B\r\nc.D\r\n", '#', &mut names);
        assert_eq!(names, vec!["a.B", "c.D"]);
    }
}
