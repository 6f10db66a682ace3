// file: src/loader/normalizer.rs
// description: Whitespace and line-break cleanup for text extracted from PDF pages

pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, content: &str) -> String {
        let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");

        normalized = self.join_hyphenated_breaks(&normalized);
        normalized = self.collapse_inline_whitespace(&normalized);
        normalized = self.normalize_line_breaks(&normalized);

        normalized.trim().to_string()
    }

    /// `exam-\nple` becomes `example`; a lone hyphen line is left alone.
    fn join_hyphenated_breaks(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut lines = content.lines().peekable();

        while let Some(line) = lines.next() {
            let trimmed = line.trim_end();
            let joinable = trimmed.len() > 1
                && trimmed.ends_with('-')
                && trimmed[..trimmed.len() - 1]
                    .chars()
                    .last()
                    .is_some_and(char::is_alphabetic)
                && lines
                    .peek()
                    .and_then(|next| next.trim_start().chars().next())
                    .is_some_and(char::is_lowercase);

            if joinable {
                result.push_str(&trimmed[..trimmed.len() - 1]);
                if let Some(next) = lines.next() {
                    result.push_str(next.trim_start());
                    result.push('\n');
                }
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        result
    }

    fn collapse_inline_whitespace(&self, content: &str) -> String {
        content
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn normalize_line_breaks(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut blank_run = 0;

        for line in content.lines() {
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            result.push_str(line);
            result.push('\n');
        }

        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
