/// Parsing du format de script `.clip`.
///
/// Un script est une suite de lignes UTF-8 ; chaque ligne porte des
/// commandes entre crochets et du texte nu. Le parseur produit une
/// séquence plate de [`ScriptElement`] que le moteur exécute comme une
/// timeline. Les corps de fonctions restent des lignes brutes : la
/// substitution de paramètres est textuelle, suivie d'un re-parse
/// juste-à-temps côté moteur.
///
/// Attention auteurs de scripts : les espaces hors crochets sont
/// TOUJOURS ignorés (on indente librement) ; un espace affiché vient
/// uniquement de `[space]` ou `[space N]`.

pub mod element;
pub mod error;
pub mod parser;

pub use element::{AliasDef, FunctionDef, ScriptElement, Timestamp};
pub use error::ParseError;
pub use parser::{parse, parse_line_content};
