use std::fmt;

/// One `--result=ctags-mod` line: `FILE<TAB>LINE<TAB>TEXT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine {
    pub file: String,
    pub line: usize,
    pub text: String,
}

impl ResultLine {
    /// Parse a result line; `None` if it does not have the three fields.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut fields = raw.splitn(3, '\t');
        let file = fields.next().filter(|f| !f.is_empty())?;
        let line = fields.next()?.trim().parse().ok()?;
        let text = fields.next().unwrap_or_default();
        Some(Self {
            file: file.to_string(),
            line,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for ResultLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.file, self.line, self.text)
    }
}
