use am_core::types::AnchorFlags;

/// A blocking pattern extracted from one subscription line, with its anchor
/// characters stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRule {
    /// 1-based line number
    pub line: usize,
    /// Trimmed line text
    pub source: String,
    /// Pattern text between the anchors
    pub body: String,
    pub anchors: AnchorFlags,
}

/// How a single line was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Exception,
    Cosmetic,
    /// Rule carrying `$option` modifiers
    Options,
    /// Anchors only, nothing to match
    Empty,
    Rule { body: String, anchors: AnchorFlags },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub blank: usize,
    pub comments: usize,
    pub exceptions: usize,
    pub cosmetic: usize,
    pub options: usize,
    pub empty: usize,
}

impl ParseStats {
    pub fn skipped(&self) -> usize {
        self.blank + self.comments + self.exceptions + self.cosmetic + self.options + self.empty
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedList {
    pub rules: Vec<ParsedRule>,
    pub stats: ParseStats,
}

pub fn parse_filter_list(text: &str) -> ParsedList {
    let mut list = ParsedList::default();

    for (index, raw_line) in text.lines().enumerate() {
        list.stats.lines += 1;
        let line = raw_line.trim();

        match classify_line(line) {
            LineKind::Blank => list.stats.blank += 1,
            LineKind::Comment => list.stats.comments += 1,
            LineKind::Exception => list.stats.exceptions += 1,
            LineKind::Cosmetic => list.stats.cosmetic += 1,
            LineKind::Options => list.stats.options += 1,
            LineKind::Empty => list.stats.empty += 1,
            LineKind::Rule { body, anchors } => list.rules.push(ParsedRule {
                line: index + 1,
                source: line.to_string(),
                body,
                anchors,
            }),
        }
    }

    list
}

/// Classify one trimmed line.
pub fn classify_line(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }

    if is_comment_line(line) {
        return LineKind::Comment;
    }

    // Exceptions are recognized but never applied.
    if line.starts_with("@@") {
        return LineKind::Exception;
    }

    if line.contains("##") || line.contains("#@#") || line.contains("#?#") {
        return LineKind::Cosmetic;
    }

    if has_rule_options(line) {
        return LineKind::Options;
    }

    let (body, anchors) = strip_anchors(line);
    if body.is_empty() {
        return LineKind::Empty;
    }

    LineKind::Rule {
        body: body.to_string(),
        anchors,
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

/// Split anchor markers off a pattern. `||` wins over `|` at the start.
fn strip_anchors(line: &str) -> (&str, AnchorFlags) {
    let mut anchors = AnchorFlags::empty();

    let mut rest = if let Some(rest) = line.strip_prefix("||") {
        anchors |= AnchorFlags::DOMAIN;
        rest
    } else if let Some(rest) = line.strip_prefix('|') {
        anchors |= AnchorFlags::START;
        rest
    } else {
        line
    };

    if let Some(stripped) = rest.strip_suffix('|') {
        anchors |= AnchorFlags::END;
        rest = stripped;
    }

    (rest, anchors)
}

/// Whether the line ends in an `$option,...` list.
fn has_rule_options(line: &str) -> bool {
    let Some(pos) = line.rfind('$') else {
        return false;
    };
    let options = &line[pos + 1..];
    !options.is_empty() && options.split(',').all(is_option_token)
}

fn is_option_token(token: &str) -> bool {
    let token = token.trim();
    let token = token.strip_prefix('~').unwrap_or(token);
    let name = match token.find('=') {
        Some(eq) => &token[..eq],
        None => token,
    };
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
