/// Ordered `key: value` header of a stored Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    fields: Vec<(String, String)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an existing value in place.
    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = single_line(&value.into());
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn parse(block: &str) -> Self {
        let fields = block
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { fields }
    }

    pub fn render(&self, body: &str) -> String {
        let mut doc = String::from("---\n");
        for (key, value) in &self.fields {
            doc.push_str(key);
            doc.push_str(": ");
            doc.push_str(value);
            doc.push('\n');
        }
        doc.push_str("---\n\n");
        doc.push_str(body.trim_start_matches('\n'));
        doc
    }
}

/// Splits a document into its frontmatter and body. A leading `---` block
/// is frontmatter only when every non-empty line in it is `key: value`.
pub fn split(markdown: &str) -> (Option<Frontmatter>, &str) {
    let Some(rest) = markdown.strip_prefix("---\n") else {
        return (None, markdown);
    };
    let Some((block, body)) = closing_fence(rest) else {
        return (None, markdown);
    };
    if !block.lines().filter(|line| !line.trim().is_empty()).all(is_field) {
        return (None, markdown);
    }
    (Some(Frontmatter::parse(block)), body.trim_start_matches('\n'))
}

fn closing_fence(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn is_field(line: &str) -> bool {
    line.split_once(':').is_some_and(|(key, _)| {
        !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
