/// Level construction errors.
///
/// Everything that can go wrong between reading a level file and handing a
/// playable `Level` to the game loop. Runtime simulation never fails.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("cannot read level file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("level has no tile rows")]
    EmptyGrid,

    #[error("level has no spawn point")]
    MissingSpawn,

    #[error("level has no exit")]
    MissingExit,

    #[error("binding line {line}: {reason}")]
    MalformedBinding { line: usize, reason: String },

    #[error("duplicate tile id {id} at column {col}, row {row}")]
    DuplicateId { id: String, col: i32, row: i32 },

    #[error("story has no level {index}")]
    UnknownLevel { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = LevelError::MalformedBinding { line: 3, reason: "delay is not a number".into() };
        assert_eq!(e.to_string(), "binding line 3: delay is not a number");
        let e = LevelError::DuplicateId { id: "S1".into(), col: 4, row: 2 };
        assert!(e.to_string().contains("S1"));
    }
}
