/// Level text format and the story that orders levels.
///
/// ## Level file
///   ```
///   #,#,#,#
///   #,P1,S1,#        <- comma-separated tile tokens, one row per line
///   #,#,#,#
///   END
///   S1, 0, D1, I1    <- actor, delayMs, target, target, ...
///   ACTIVE, 0, H1    <- force ids on at start-up
///   ```
///
/// A token's first character is its type; the whole token is its id.
/// Blank lines are skipped. Rows shorter than the widest row are padded with
/// empty tiles.
///
/// ## Story file
///   ```
///   # comment
///   First Light, levels/first.txt, default
///   ```
///
/// `name, path, theme` per line. Paths are relative to the story file. The
/// theme is accepted and ignored. Without a story file the built-in levels
/// are used.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::error::LevelError;

/// Parsed, unvalidated level text.
#[derive(Clone, Debug)]
pub struct LevelDescription {
    pub name: String,
    pub rows: Vec<Vec<String>>,
    pub bindings: Vec<BindingLine>,
}

impl LevelDescription {
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindingLine {
    pub actor: String,
    pub delay_ms: u32,
    pub targets: Vec<String>,
}

impl BindingLine {
    pub fn is_activation(&self) -> bool {
        self.actor == "ACTIVE"
    }
}

// ══════════════════════════════════════════════════════════════
// Level text
// ══════════════════════════════════════════════════════════════

pub fn parse_level(name: &str, content: &str) -> Result<LevelDescription, LevelError> {
    let mut rows: Vec<Vec<String>> = vec![];
    let mut bindings = vec![];
    let mut in_grid = true;

    for (n, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if in_grid {
            if trimmed.starts_with("END") {
                in_grid = false;
                continue;
            }
            rows.push(trimmed.split(',').map(|t| t.trim().to_string()).collect());
        } else {
            bindings.push(parse_binding(n + 1, trimmed)?);
        }
    }

    if rows.is_empty() {
        return Err(LevelError::EmptyGrid);
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, ".".to_string());
        for token in row.iter_mut().filter(|t| t.is_empty()) {
            *token = ".".to_string();
        }
    }

    Ok(LevelDescription { name: name.to_string(), rows, bindings })
}

fn parse_binding(line: usize, text: &str) -> Result<BindingLine, LevelError> {
    let mut fields = text.split(',').map(str::trim);
    let actor = fields.next().filter(|a| !a.is_empty()).ok_or_else(|| LevelError::MalformedBinding {
        line,
        reason: "missing actor".into(),
    })?;
    let delay = fields.next().ok_or_else(|| LevelError::MalformedBinding {
        line,
        reason: "missing delay".into(),
    })?;
    let delay_ms = delay.parse::<u32>().map_err(|_| LevelError::MalformedBinding {
        line,
        reason: format!("delay {delay:?} is not a number"),
    })?;
    let targets = fields.filter(|t| !t.is_empty()).map(str::to_string).collect();
    Ok(BindingLine { actor: actor.to_string(), delay_ms, targets })
}

// ══════════════════════════════════════════════════════════════
// Story
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
enum LevelSource {
    File(PathBuf),
    Embedded(&'static str),
}

#[derive(Clone, Debug)]
pub struct StoryEntry {
    pub name: String,
    source: LevelSource,
}

#[derive(Clone, Debug)]
pub struct Story {
    entries: Vec<StoryEntry>,
}

impl Story {
    /// The levels compiled into the binary.
    pub fn embedded() -> Self {
        let entries = EMBEDDED
            .iter()
            .map(|(name, text)| StoryEntry { name: name.to_string(), source: LevelSource::Embedded(text) })
            .collect();
        Story { entries }
    }

    pub fn parse(content: &str, base: &Path) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| {
                let mut parts = l.split(',').map(str::trim);
                let name = parts.next()?;
                let path = parts.next().filter(|p| !p.is_empty())?;
                Some(StoryEntry { name: name.to_string(), source: LevelSource::File(base.join(path)) })
            })
            .collect();
        Story { entries }
    }

    /// Read a story file, falling back to the built-in levels.
    pub fn discover(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no story file, using built-in levels");
            return Story::embedded();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let base = path.parent().unwrap_or(Path::new("."));
                let story = Story::parse(&text, base);
                if story.is_empty() {
                    warn!(path = %path.display(), "story file lists no levels, using built-in levels");
                    return Story::embedded();
                }
                info!(path = %path.display(), levels = story.len(), "story loaded");
                story
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read story file, using built-in levels");
                Story::embedded()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Read and parse level `index`.
    pub fn description(&self, index: usize) -> Result<LevelDescription, LevelError> {
        let entry = self.entries.get(index).ok_or(LevelError::UnknownLevel { index })?;
        match &entry.source {
            LevelSource::Embedded(text) => parse_level(&entry.name, text),
            LevelSource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                parse_level(&entry.name, &text)
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: &[(&str, &str)] = &[
    ("First Light", FIRST_LIGHT),
    ("Rising Tide", RISING_TIDE),
    ("Hall of Mirrors", HALL_OF_MIRRORS),
];

const FIRST_LIGHT: &str = "\
#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#
#,.,.,.,.,.,.,.,.,.,.,.,.,.,.,#
#,.,.,.,.,.,.,.,.,.,.,I1,.,.,.,#
#,.,.,.,.,.,.,.,.,~,~,~,~,L,.,#
#,.,.,.,.,.,.,.,.,.,.,D1,.,L,.,#
#,.,.,.,.,.,.,.,.,.,.,D1,.,L,.,#
#,.,P1,.,S1,.,.,^,.,.,.,D1,.,L,X,#
#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#
END
S1, 0, D1, I1
";

const RISING_TIDE: &str = "\
#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#
#,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,#
#,.,.,.,.,.,.,.,.,.,.,.,.,.,.,X2,.,#
#,.,.,.,.,.,.,.,.,.,.,.,.,.,.,#,#,#
#,.,.,.,.,.,.,H1,H1,.,.,.,.,.,.,.,.,#
#,.,.,S1,.,.,#,.,.,.,.,.,.,#,.,.,.,#
#,P1,.,.,.,.,#,.,.,.,.,.,.,#,.,S2,.,#
#,#,#,#,#,#,#,.,.,W1,.,.,E1,#,#,#,#,#
#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#
END
S1, 0, W1
S2, 250, E1
ACTIVE, 0, H1
";

const HALL_OF_MIRRORS: &str = "\
#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#
#,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,#
#,.,Z1,.,.,.,.,.,M1,.,.,.,.,.,M2,.,.,.,.,.,#
#,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,.,#
#,.,.,.,.,.,.,.,M3,.,.,.,.,.,M4,.,.,.,.,.,#
#,.,.,.,.,.,.,.,I1,.,.,.,D1,.,.,.,~,~,l1,.,#
#,.,.,.,.,.,.,.,.,.,.,.,D1,.,.,.,.,.,l2,.,#
#,.,P1,.,T1,.,.,P2,.,S1,.,.,D1,.,.,.,.,.,l3,X,#
#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#,#
END
Z1, 0, M1
M1, 0, M2, M3
M2, 0, M4
M4, 0, D1
M3, 0, I1
T1, 0, M1
S1, 500, l1, l2, l3
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_and_bindings_split_at_end() {
        let d = parse_level("t", "#,#,#\n#,P1,X\n\nEND\nS1, 0, D1, I1\nACTIVE, 0, H1\n").unwrap();
        assert_eq!(d.height(), 2);
        assert_eq!(d.width(), 3);
        assert_eq!(d.rows[1], vec!["#", "P1", "X"]);
        assert_eq!(d.bindings[0], BindingLine {
            actor: "S1".into(),
            delay_ms: 0,
            targets: vec!["D1".into(), "I1".into()],
        });
        assert!(d.bindings[1].is_activation());
    }

    #[test]
    fn ragged_rows_are_padded() {
        let d = parse_level("t", "#,#,#,#\n#,P1\n#,#,#,#\nEND\n").unwrap();
        assert_eq!(d.rows[1], vec!["#", "P1", ".", "."]);
        assert!(d.bindings.is_empty());
    }

    #[test]
    fn trailing_commas_do_not_add_targets() {
        let d = parse_level("t", "P1,X\nEND\nS1, 100, D1, ,\n").unwrap();
        assert_eq!(d.bindings[0].targets, vec!["D1".to_string()]);
        assert_eq!(d.bindings[0].delay_ms, 100);
    }

    #[test]
    fn malformed_bindings_are_errors() {
        let err = parse_level("t", "P1,X\nEND\nS1\n").unwrap_err();
        assert!(matches!(err, LevelError::MalformedBinding { line: 3, .. }));
        let err = parse_level("t", "P1,X\nEND\nS1, soon, D1\n").unwrap_err();
        assert!(matches!(err, LevelError::MalformedBinding { line: 3, .. }));
    }

    #[test]
    fn empty_level_is_an_error() {
        assert!(matches!(parse_level("t", "\n\nEND\n"), Err(LevelError::EmptyGrid)));
    }

    #[test]
    fn story_lines_resolve_relative_paths() {
        let story = Story::parse("# comment\nOne, a.txt, default\n\nTwo, sub/b.txt\nbroken\n", Path::new("/data"));
        assert_eq!(story.len(), 2);
        assert_eq!(story.names().collect::<Vec<_>>(), vec!["One", "Two"]);
        let err = story.description(0).unwrap_err();
        assert!(matches!(err, LevelError::Io { .. }));
        assert!(matches!(story.description(5), Err(LevelError::UnknownLevel { index: 5 })));
    }

    #[test]
    fn embedded_levels_parse() {
        let story = Story::embedded();
        assert_eq!(story.len(), 3);
        for i in 0..story.len() {
            let d = story.description(i).unwrap();
            assert!(d.width() > 0);
            assert!(d.rows.iter().all(|r| r.len() == d.width()));
        }
    }

    #[test]
    fn missing_story_falls_back() {
        let story = Story::discover(Some(Path::new("/nonexistent/story.txt")));
        assert_eq!(story.len(), 3);
        assert_eq!(Story::discover(None).len(), 3);
    }
}
