use serde::Deserialize;

/// Model output parsed into a title and ordered sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneratedContent {
    pub title: Option<String>,
    pub sections: Vec<GeneratedSection>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedSection {
    /// Slot the section fills in an interview report, e.g. `emotions`.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default, alias = "content")]
    pub body: String,
}

impl GeneratedContent {
    pub fn section(&self, key: &str) -> Option<&GeneratedSection> {
        self.sections
            .iter()
            .find(|s| s.key.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(key)))
    }
}

/// Pulls the JSON object out of a reply that may wrap it in a code fence
/// or surround it with prose.
pub(crate) fn extract_json(content: &str) -> &str {
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner;
        }
    }
    if let Some(start) = content.find('{')
        && let Some(end) = content.rfind('}')
        && start < end
    {
        return &content[start..=end];
    }
    content
}

/// Parses the model reply. Text that is not the expected JSON becomes a
/// single untitled section so the prose is never lost.
pub fn parse_generated(content: &str) -> GeneratedContent {
    #[derive(Deserialize)]
    struct RawContent {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        sections: Vec<GeneratedSection>,
    }

    let parsed = serde_json::from_str::<RawContent>(extract_json(content))
        .ok()
        .map(|raw| GeneratedContent {
            title: clean_optional(raw.title),
            sections: raw
                .sections
                .into_iter()
                .map(|s| GeneratedSection {
                    key: s.key.map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()),
                    heading: clean_optional(s.heading),
                    body: s.body.trim().to_string(),
                })
                .filter(|s| s.heading.is_some() || !s.body.is_empty())
                .collect(),
        })
        .filter(|c| !c.sections.is_empty());

    match parsed {
        Some(content) => content,
        None => {
            tracing::debug!(len = content.len(), "Model reply is not section JSON, using raw text");
            GeneratedContent {
                title: None,
                sections: vec![GeneratedSection {
                    key: None,
                    heading: None,
                    body: content.trim().to_string(),
                }],
            }
        }
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

/// Strips markdown emphasis and heading markers models like to add.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim_end();
            let stripped = line.trim_start().trim_start_matches('#');
            let line = if stripped.len() < line.trim_start().len() {
                stripped.trim_start()
            } else {
                line
            };
            line.replace("**", "").replace("__", "")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Splits a body into paragraphs on blank lines.
pub fn paragraphs(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(clean_text(&current.join("\n")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(clean_text(&current.join("\n")));
    }
    out.retain(|p| !p.is_empty());
    out
}
