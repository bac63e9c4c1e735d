use thiserror::Error;

/// Errors raised while parsing a `.clip` script.
///
/// Every variant carries the 1-based line number of the offending
/// line. For content re-parsed at run time (alias or function
/// expansion), the line number is relative to the expanded text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Bracket content that starts like a timestamp but does not
    /// parse as one.
    #[error("Ligne {line} : horodatage invalide « {token} »")]
    MalformedTimestamp {
        /// Offending line.
        line: usize,
        /// The token as written.
        token: String,
    },

    /// A content line that is neither a continuation, a definition,
    /// nor a bpm line must open with a timestamp.
    #[error("Ligne {line} : un horodatage est attendu en début de ligne")]
    MissingTimestamp {
        /// Offending line.
        line: usize,
    },

    /// A `[style …]` word that is not a style keyword.
    #[error("Ligne {line} : mot de style inconnu « {word} »")]
    UnknownStyleWord {
        /// Offending line.
        line: usize,
        /// The word as written.
        word: String,
    },

    /// Alias or function defined under a language keyword.
    #[error("Ligne {line} : « {name} » est un nom réservé")]
    ReservedName {
        /// Offending line.
        line: usize,
        /// The rejected name.
        name: String,
    },

    /// A continuation marker cannot feed into a function definition
    /// header.
    #[error("Ligne {line} : une continuation ne peut pas ouvrir une définition de fonction")]
    ContinuationIntoDefinition {
        /// Offending line.
        line: usize,
    },

    /// A keyword command with arguments that do not parse.
    #[error("Ligne {line} : commande invalide « [{content}] »")]
    InvalidCommand {
        /// Offending line.
        line: usize,
        /// The bracket content as written.
        content: String,
    },
}

impl ParseError {
    /// The 1-based line number the error points at.
    #[must_use]
    pub fn line(&self) -> usize {
        match *self {
            Self::MalformedTimestamp { line, .. }
            | Self::MissingTimestamp { line }
            | Self::UnknownStyleWord { line, .. }
            | Self::ReservedName { line, .. }
            | Self::ContinuationIntoDefinition { line }
            | Self::InvalidCommand { line, .. } => line,
        }
    }
}
