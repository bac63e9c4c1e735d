use kt_core::cell::{Rgb, Rgba};

/// Noms interdits pour les alias et les fonctions : ce sont les mots
/// clés du langage.
pub const RESERVED_NAMES: &[&str] = &[
    "bpm",
    "newline",
    "mv",
    "color",
    "clearcolor",
    "background",
    "clearbackground",
    "style",
    "clearstyle",
    "clear",
    "clearn",
    "space",
    "override",
];

/// `true` si `name` est un mot clé du langage.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Horodatage d'un événement, en temps musical ou absolu.
///
/// Les formes `XbY` expriment une fraction X/Y d'un temps ; `Xb` vaut
/// X temps ; un nombre nu est en millisecondes. Le préfixe `+` rend
/// la valeur relative au dernier événement du scope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Timestamp {
    /// `mm:ss.xxx` — millisecondes absolues depuis le début du scope.
    AbsoluteMs(i64),
    /// `Nb` — temps absolu en beats (fractionnaires).
    AbsoluteBeat(f64),
    /// `Nb+K` — N beats plus K millisecondes.
    AbsoluteBeatPlusMs(f64, i64),
    /// `Nb+MbK` — N beats plus la fraction M/K d'un beat.
    AbsoluteBeatPlusFraction(f64, f64, f64),
    /// `+N` — N millisecondes après le dernier événement.
    RelativeMs(i64),
    /// `+Nb` — N beats après le dernier événement.
    RelativeBeat(f64),
    /// `+NbK` — la fraction N/K d'un beat après le dernier événement.
    RelativeFractionBeat(f64, f64),
    /// Sentinelle : réutilise l'offset du dernier événement.
    Continuation,
}

impl Timestamp {
    /// Offset de l'événement en millisecondes depuis le début du
    /// scope, pour un tempo donné.
    ///
    /// `ms_per_beat` vaut `60000 / bpm` ; `last_ms` est l'offset du
    /// dernier événement non-continuation du scope.
    ///
    /// # Example
    /// ```
    /// use kt_script::element::Timestamp;
    /// let mpb = 60_000.0 / 120.0; // 500 ms par beat
    /// assert_eq!(Timestamp::AbsoluteBeat(1.0).offset_ms(mpb, 0), 500);
    /// assert_eq!(Timestamp::RelativeMs(100).offset_ms(mpb, 500), 600);
    /// ```
    #[must_use]
    pub fn offset_ms(&self, ms_per_beat: f64, last_ms: i64) -> i64 {
        match *self {
            Self::AbsoluteMs(ms) => ms,
            Self::AbsoluteBeat(b) => round_ms(b * ms_per_beat),
            Self::AbsoluteBeatPlusMs(b, off) => round_ms(b * ms_per_beat) + off,
            Self::AbsoluteBeatPlusFraction(b, num, den) => {
                round_ms(b * ms_per_beat + (num / den) * ms_per_beat)
            }
            Self::RelativeMs(ms) => last_ms + ms,
            Self::RelativeBeat(b) => last_ms + round_ms(b * ms_per_beat),
            Self::RelativeFractionBeat(num, den) => last_ms + round_ms((num / den) * ms_per_beat),
            Self::Continuation => last_ms,
        }
    }

    /// `true` pour la sentinelle de continuation.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        matches!(self, Self::Continuation)
    }
}

#[inline]
fn round_ms(v: f64) -> i64 {
    v.round() as i64
}

/// Élément de script parsé. Union étiquetée : le moteur dispatche par
/// pattern matching.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptElement {
    /// Attendre jusqu'à l'offset calculé.
    Timestamp(Timestamp),
    /// Changer le tempo du scope courant.
    SetBpm(f64),
    /// Curseur : ligne suivante, colonne zéro.
    NewLine,
    /// Effacer la grille, re-positionner le curseur en (0,0) et
    /// réinitialiser son style.
    ClearScreen,
    /// Effacer la grille sans toucher au curseur.
    ClearScreenNoReset,
    /// Position absolue 1-based `(row, col)`.
    MoveAbsolute { row: i32, col: i32 },
    /// Déplacement relatif signé.
    MoveRelative { d_row: i32, d_col: i32 },
    /// Couleur de texte du curseur.
    SetColor(Rgb),
    /// Revenir à la couleur de texte par défaut.
    ClearColor,
    /// Couleur de fond du curseur (l'alpha est retenu, pas émis).
    SetBackground(Rgba),
    /// Revenir au fond par défaut.
    ClearBackground,
    /// Drapeaux de style du curseur.
    SetStyle {
        bold: bool,
        italic: bool,
        underline: bool,
        strikethrough: bool,
    },
    /// Effacer style et couleurs du curseur.
    ClearStyle,
    /// Imprimer `count` espaces (≥ 1).
    PrintSpace(usize),
    /// Imprimer du texte, caractère par caractère.
    PrintText(String),
    /// Définition d'alias : contenu brut, re-parsé à l'appel.
    DefineAlias { name: String, raw_content: String },
    /// Définition de fonction : corps brut, substitué puis re-parsé à
    /// l'appel.
    DefineFunction {
        name: String,
        params: Vec<String>,
        raw_body_lines: Vec<String>,
        allow_override: bool,
    },
    /// Appel synchrone d'une fonction ou d'un alias.
    CallFunction { name: String, args: Vec<String> },
    /// Appel asynchrone d'une fonction dans une branche concurrente.
    CallCoroutine { name: String, args: Vec<String> },
}

/// Définition de fonction indexée par le pré-scan du moteur.
///
/// Le corps reste brut : `[param]` y est remplacé textuellement par
/// l'argument avant re-parse, ce qui autorise un paramètre au milieu
/// d'une commande (`[color [hex]]`).
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    /// Nom d'appel.
    pub name: String,
    /// Paramètres formels, dans l'ordre.
    pub params: Vec<String>,
    /// Lignes du corps, non parsées.
    pub raw_body_lines: Vec<String>,
    /// Les branches issues de cette fonction peuvent remplacer les
    /// cellules écrites par le curseur principal.
    pub allow_override: bool,
}

/// Définition d'alias : une ligne de contenu brut.
#[derive(Clone, Debug, PartialEq)]
pub struct AliasDef {
    /// Nom d'appel.
    pub name: String,
    /// Contenu verbatim, re-parsé à chaque appel.
    pub raw_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MPB: f64 = 500.0; // 120 bpm

    #[test]
    fn absolute_forms() {
        assert_eq!(Timestamp::AbsoluteMs(250).offset_ms(MPB, 999), 250);
        assert_eq!(Timestamp::AbsoluteBeat(2.0).offset_ms(MPB, 999), 1000);
        assert_eq!(Timestamp::AbsoluteBeat(1.5).offset_ms(MPB, 0), 750);
        assert_eq!(Timestamp::AbsoluteBeatPlusMs(1.0, 30).offset_ms(MPB, 0), 530);
        assert_eq!(
            Timestamp::AbsoluteBeatPlusFraction(2.0, 1.0, 4.0).offset_ms(MPB, 0),
            1125
        );
    }

    #[test]
    fn relative_forms_add_to_last() {
        assert_eq!(Timestamp::RelativeMs(100).offset_ms(MPB, 400), 500);
        assert_eq!(Timestamp::RelativeBeat(1.0).offset_ms(MPB, 400), 900);
        assert_eq!(
            Timestamp::RelativeFractionBeat(1.0, 2.0).offset_ms(MPB, 400),
            650
        );
    }

    #[test]
    fn continuation_reuses_last() {
        assert_eq!(Timestamp::Continuation.offset_ms(MPB, 777), 777);
        assert!(Timestamp::Continuation.is_continuation());
    }

    #[test]
    fn reserved_names_are_rejected() {
        assert!(is_reserved("bpm"));
        assert!(is_reserved("override"));
        assert!(!is_reserved("greet"));
    }
}
