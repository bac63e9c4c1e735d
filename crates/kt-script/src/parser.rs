//! Parseur du format `.clip` : passe ligne-à-ligne puis tokenisation
//! des crochets. Le contenu des crochets est dispatché dans un ordre
//! fixe ; la première forme qui matche gagne.

use kt_core::cell::{Rgb, Rgba};

use crate::element::{ScriptElement, Timestamp, is_reserved};
use crate::error::ParseError;

/// Marqueur de continuation en fin de ligne : la ligne suivante
/// réutilise l'offset du dernier événement.
const CONTINUATION_MARKER: &str = "[>]";
/// Marqueur d'une ligne de corps de fonction.
const BODY_MARKER: &str = "[<]";

/// Parse un script complet en séquence plate d'éléments.
///
/// Les lignes vides et les commentaires `//` sont ignorés. Une ligne
/// terminée par `[>]` non échappé fait de la ligne suivante une
/// consommatrice de continuation. Après un en-tête `[#nom …]`, les
/// lignes `[<]…` sont capturées brutes comme corps de la fonction.
///
/// # Errors
/// Toute violation de la grammaire est signalée avec le numéro de la
/// ligne fautive.
///
/// # Example
/// ```
/// use kt_script::parser::parse;
/// let elements = parse(&["[bpm 120][0b]hi"]).unwrap();
/// assert_eq!(elements.len(), 3);
/// ```
pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Vec<ScriptElement>, ParseError> {
    let mut elements = Vec::new();
    let mut pending_continuation = false;
    let mut capture: Option<FunctionCapture> = None;

    for (idx, raw) in lines.iter().enumerate() {
        let raw = raw.as_ref();
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        if capture.is_some() {
            if trimmed.starts_with(BODY_MARKER) {
                if let Some(cap) = capture.as_mut() {
                    let start = raw.find(BODY_MARKER).unwrap_or(0) + BODY_MARKER.len();
                    cap.raw_body_lines.push(raw[start..].to_string());
                }
                continue;
            }
            // toute autre ligne termine le corps
            if let Some(done) = capture.take() {
                elements.push(done.into_element());
            }
        }

        let consumes_continuation = pending_continuation;
        pending_continuation = false;

        let (content, produces) = strip_continuation(raw);
        if produces {
            pending_continuation = true;
        }

        let parsed = parse_line_content_at(content, line_no)?;
        if parsed.is_empty() {
            continue;
        }

        // En-tête de définition de fonction ?
        if let Some(pos) = parsed
            .iter()
            .position(|e| matches!(e, ScriptElement::DefineFunction { .. }))
        {
            if consumes_continuation {
                return Err(ParseError::ContinuationIntoDefinition { line: line_no });
            }
            let allow_override = parsed
                .iter()
                .any(|e| matches!(e, ScriptElement::PrintText(t) if t == "[override]"));
            if let ScriptElement::DefineFunction { name, params, .. } = &parsed[pos] {
                capture = Some(FunctionCapture {
                    name: name.clone(),
                    params: params.clone(),
                    allow_override,
                    raw_body_lines: Vec::new(),
                });
            }
            continue;
        }

        if consumes_continuation {
            elements.push(ScriptElement::Timestamp(Timestamp::Continuation));
        } else {
            match parsed.first() {
                Some(
                    ScriptElement::Timestamp(_)
                    | ScriptElement::SetBpm(_)
                    | ScriptElement::DefineAlias { .. },
                ) => {}
                _ => return Err(ParseError::MissingTimestamp { line: line_no }),
            }
        }
        elements.extend(parsed);
    }

    if let Some(done) = capture.take() {
        elements.push(done.into_element());
    }

    Ok(elements)
}

/// Tokenise une seule ligne de contenu, sans la logique ligne-à-ligne
/// (continuations, corps de fonctions). C'est le point d'entrée du
/// re-parse juste-à-temps après expansion d'un alias ou substitution
/// des paramètres d'une fonction.
///
/// # Errors
/// Contenu de crochet invalide ; le numéro de ligne rapporté est
/// relatif au texte expansé.
pub fn parse_line_content(content: &str) -> Result<Vec<ScriptElement>, ParseError> {
    parse_line_content_at(content, 1)
}

/// Corps de fonction en cours de capture.
struct FunctionCapture {
    name: String,
    params: Vec<String>,
    allow_override: bool,
    raw_body_lines: Vec<String>,
}

impl FunctionCapture {
    fn into_element(self) -> ScriptElement {
        ScriptElement::DefineFunction {
            name: self.name,
            params: self.params,
            raw_body_lines: self.raw_body_lines,
            allow_override: self.allow_override,
        }
    }
}

/// Détache un marqueur `[>]` final non échappé.
fn strip_continuation(line: &str) -> (&str, bool) {
    let t = line.trim_end();
    if let Some(stripped) = t.strip_suffix(CONTINUATION_MARKER) {
        let backslashes = stripped.chars().rev().take_while(|&c| c == '\\').count();
        if backslashes % 2 == 0 {
            return (stripped, true);
        }
    }
    (t, false)
}

fn parse_line_content_at(content: &str, line: usize) -> Result<Vec<ScriptElement>, ParseError> {
    let chars: Vec<char> = content.chars().collect();
    let mut out = Vec::new();
    let mut acc = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                ch @ ('[' | ']' | '\\' | '>') => acc.push(ch),
                'n' => acc.push('\n'),
                't' => acc.push('\t'),
                _ => {
                    acc.push('\\');
                    i += 1;
                    continue;
                }
            }
            i += 2;
            continue;
        }
        if c == '[' {
            if let Some(end) = matching_bracket(&chars, i) {
                flush_text(&mut acc, &mut out);
                let inner: String = chars[i + 1..end].iter().collect();
                out.push(parse_bracket_content(&inner, line)?);
                i = end + 1;
            } else {
                // crochet non terminé : caractère littéral
                acc.push('[');
                i += 1;
            }
            continue;
        }
        if c.is_whitespace() {
            // les blancs hors crochets sont ignorés
            i += 1;
            continue;
        }
        acc.push(c);
        i += 1;
    }

    flush_text(&mut acc, &mut out);
    Ok(out)
}

fn flush_text(acc: &mut String, out: &mut Vec<ScriptElement>) {
    if !acc.is_empty() {
        out.push(ScriptElement::PrintText(std::mem::take(acc)));
    }
}

/// Cherche le `]` appariant, en profondeur, en sautant les échappés.
fn matching_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Dispatch du contenu d'un crochet. L'ordre des formes est figé.
fn parse_bracket_content(inner: &str, line: usize) -> Result<ScriptElement, ParseError> {
    let content = inner.trim();

    // 1. Horodatages. Un contenu qui commence comme un horodatage est
    // revendiqué par cette règle : mal formé, il est une erreur, pas
    // du texte.
    if looks_like_timestamp(content) {
        let ts = parse_timestamp(content).ok_or_else(|| ParseError::MalformedTimestamp {
            line,
            token: content.to_string(),
        })?;
        return Ok(ScriptElement::Timestamp(ts));
    }

    // 2. bpm
    if let Some(rest) = keyword_rest(content, "bpm") {
        let bpm = parse_number(rest.trim())
            .filter(|v| *v > 0.0)
            .ok_or_else(|| invalid(line, content))?;
        return Ok(ScriptElement::SetBpm(bpm));
    }

    // 3. space / space N (borné à 1 minimum)
    if content == "space" {
        return Ok(ScriptElement::PrintSpace(1));
    }
    if let Some(rest) = keyword_rest(content, "space") {
        let n: i64 = rest.trim().parse().map_err(|_| invalid(line, content))?;
        return Ok(ScriptElement::PrintSpace(usize::try_from(n.max(1)).unwrap_or(1)));
    }

    // 4. Mots clés nus
    match content {
        "newline" => return Ok(ScriptElement::NewLine),
        "clear" => return Ok(ScriptElement::ClearScreen),
        "clearn" => return Ok(ScriptElement::ClearScreenNoReset),
        "clearcolor" => return Ok(ScriptElement::ClearColor),
        "clearbackground" => return Ok(ScriptElement::ClearBackground),
        "clearstyle" => return Ok(ScriptElement::ClearStyle),
        _ => {}
    }

    // 5. mv R,C — signé ⇒ relatif, non signé ⇒ absolu 1-based
    if let Some(rest) = keyword_rest(content, "mv") {
        return parse_mv(rest, line, content);
    }

    // 6. color [#]RRGGBB
    if let Some(rest) = keyword_rest(content, "color") {
        let rgb = parse_hex_rgb(rest.trim()).ok_or_else(|| invalid(line, content))?;
        return Ok(ScriptElement::SetColor(rgb));
    }

    // 7. background [#]RRGGBBAA
    if let Some(rest) = keyword_rest(content, "background") {
        let rgba = parse_hex_rgba(rest.trim()).ok_or_else(|| invalid(line, content))?;
        return Ok(ScriptElement::SetBackground(rgba));
    }

    // 8. style MOTS
    if let Some(rest) = keyword_rest(content, "style") {
        return parse_style(rest, line);
    }

    // 9. #NOM p1,p2,… — en-tête de définition de fonction
    if let Some(rest) = content.strip_prefix('#') {
        let (name, tail) = split_ident(rest);
        if !name.is_empty() && (tail.is_empty() || tail.starts_with(char::is_whitespace)) {
            if is_reserved(name) {
                return Err(ParseError::ReservedName {
                    line,
                    name: name.to_string(),
                });
            }
            return Ok(ScriptElement::DefineFunction {
                name: name.to_string(),
                params: split_list(tail, false),
                raw_body_lines: Vec::new(),
                allow_override: false,
            });
        }
    }

    // 10. @NOM contenu-verbatim
    if let Some(rest) = content.strip_prefix('@') {
        let (name, tail) = split_ident(rest);
        if !name.is_empty() && (tail.is_empty() || tail.starts_with(char::is_whitespace)) {
            if is_reserved(name) {
                return Err(ParseError::ReservedName {
                    line,
                    name: name.to_string(),
                });
            }
            return Ok(ScriptElement::DefineAlias {
                name: name.to_string(),
                raw_content: tail.trim_start().to_string(),
            });
        }
    }

    // 11. ++NOM a1,a2,…
    if let Some(rest) = content.strip_prefix("++") {
        let (name, tail) = split_ident(rest);
        if !name.is_empty() && (tail.is_empty() || tail.starts_with(char::is_whitespace)) {
            return Ok(ScriptElement::CallCoroutine {
                name: name.to_string(),
                args: split_list(tail, true),
            });
        }
    }

    // 12. NOM a1,a2,… — appel de fonction ou d'alias. Les mots clés
    // ne sont jamais des appels : [override] retombe en littéral, ce
    // qui permet à l'en-tête de fonction de le détecter.
    {
        let (name, tail) = split_ident(content);
        if !name.is_empty()
            && (tail.is_empty() || tail.starts_with(char::is_whitespace))
            && !is_reserved(name)
        {
            return Ok(ScriptElement::CallFunction {
                name: name.to_string(),
                args: split_list(tail, true),
            });
        }
    }

    // 13. Texte littéral, crochets préservés
    Ok(ScriptElement::PrintText(format!("[{inner}]")))
}

fn invalid(line: usize, content: &str) -> ParseError {
    ParseError::InvalidCommand {
        line,
        content: content.to_string(),
    }
}

/// `content` commence par `kw` suivi d'un blanc : retourne la suite.
fn keyword_rest<'a>(content: &'a str, kw: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(kw)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Coupe un identifiant en tête (`lettre` ou `_`, puis alphanumérique
/// ou `_`) du reste de la chaîne.
fn split_ident(s: &str) -> (&str, &str) {
    let mut end = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    s.split_at(end)
}

/// Liste séparée par des virgules. `keep_empty` préserve les
/// positions vides (arguments d'appel) ; les paramètres formels les
/// ignorent.
fn split_list(s: &str, keep_empty: bool) -> Vec<String> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| keep_empty || !item.is_empty())
        .collect()
}

fn parse_mv(rest: &str, line: usize, content: &str) -> Result<ScriptElement, ParseError> {
    let rest = rest.trim();
    let (a, b) = rest.split_once(',').ok_or_else(|| invalid(line, content))?;
    let a = a.trim();
    let b = b.trim();
    let signed = a.starts_with(['+', '-']) || b.starts_with(['+', '-']);
    let row: i32 = a.parse().map_err(|_| invalid(line, content))?;
    let col: i32 = b.parse().map_err(|_| invalid(line, content))?;
    if signed {
        Ok(ScriptElement::MoveRelative { d_row: row, d_col: col })
    } else {
        Ok(ScriptElement::MoveAbsolute { row, col })
    }
}

fn parse_style(rest: &str, line: usize) -> Result<ScriptElement, ParseError> {
    let mut bold = false;
    let mut italic = false;
    let mut underline = false;
    let mut strikethrough = false;
    for word in rest.split_whitespace() {
        match word {
            "bold" => bold = true,
            "italic" => italic = true,
            "underline" => underline = true,
            "strike" | "strikethrough" => strikethrough = true,
            other => {
                return Err(ParseError::UnknownStyleWord {
                    line,
                    word: other.to_string(),
                });
            }
        }
    }
    Ok(ScriptElement::SetStyle {
        bold,
        italic,
        underline,
        strikethrough,
    })
}

fn parse_hex_rgb(s: &str) -> Option<Rgb> {
    let s = s.strip_prefix('#').unwrap_or(s);
    if s.len() != 6 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let v = u32::from_str_radix(s, 16).ok()?;
    Some(Rgb {
        r: (v >> 16) as u8,
        g: (v >> 8) as u8,
        b: v as u8,
    })
}

fn parse_hex_rgba(s: &str) -> Option<Rgba> {
    let s = s.strip_prefix('#').unwrap_or(s);
    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match s.len() {
        8 => {
            let v = u32::from_str_radix(s, 16).ok()?;
            Some(Rgba {
                r: (v >> 24) as u8,
                g: (v >> 16) as u8,
                b: (v >> 8) as u8,
                a: v as u8,
            })
        }
        // alpha omis : opaque
        6 => {
            let rgb = parse_hex_rgb(s)?;
            Some(Rgba {
                r: rgb.r,
                g: rgb.g,
                b: rgb.b,
                a: 0xFF,
            })
        }
        _ => None,
    }
}

// === Horodatages ===

/// Premier caractère d'un horodatage : chiffre, ou `+` suivi d'un
/// chiffre ou d'un point (`++` est un appel de coroutine).
fn looks_like_timestamp(s: &str) -> bool {
    let mut it = s.chars();
    match it.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') => matches!(it.next(), Some(c) if c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

fn parse_timestamp(s: &str) -> Option<Timestamp> {
    if let Some(rest) = s.strip_prefix('+') {
        return parse_relative(rest);
    }
    if s.contains(':') {
        return parse_clock(s);
    }
    parse_absolute_beats(s)
}

/// `mm:ss.xxx` → millisecondes absolues.
fn parse_clock(s: &str) -> Option<Timestamp> {
    let (mm, ss) = s.split_once(':')?;
    if mm.is_empty() {
        return None;
    }
    let minutes: i64 = mm.parse().ok()?;
    let seconds = parse_number(ss)?;
    Some(Timestamp::AbsoluteMs(
        minutes * 60_000 + (seconds * 1000.0).round() as i64,
    ))
}

/// `Nb`, `Nb+K`, `Nb+MbK`.
fn parse_absolute_beats(s: &str) -> Option<Timestamp> {
    match s.split_once('+') {
        Some((beats, tail)) => {
            let b = parse_number(beats.strip_suffix('b')?)?;
            if let Some((num, den)) = split_fraction(tail) {
                Some(Timestamp::AbsoluteBeatPlusFraction(b, num, den))
            } else {
                Some(Timestamp::AbsoluteBeatPlusMs(b, parse_number(tail)?.round() as i64))
            }
        }
        None => Some(Timestamp::AbsoluteBeat(parse_number(s.strip_suffix('b')?)?)),
    }
}

/// `NbK`, `Nb`, `N` (après le `+` initial).
fn parse_relative(rest: &str) -> Option<Timestamp> {
    if let Some((num, den)) = split_fraction(rest) {
        return Some(Timestamp::RelativeFractionBeat(num, den));
    }
    if let Some(beats) = rest.strip_suffix('b') {
        return Some(Timestamp::RelativeBeat(parse_number(beats)?));
    }
    Some(Timestamp::RelativeMs(parse_number(rest)?.round() as i64))
}

/// `NbK` : la fraction N/K d'un beat.
fn split_fraction(s: &str) -> Option<(f64, f64)> {
    let (num, den) = s.split_once('b')?;
    if den.is_empty() {
        return None;
    }
    let num = parse_number(num)?;
    let den = parse_number(den)?;
    if den == 0.0 {
        return None;
    }
    Some((num, den))
}

/// Nombre décimal non signé, au plus une partie fractionnaire.
fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in s.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
    }
    if !seen_digit {
        return None;
    }
    s.parse().ok()
}
