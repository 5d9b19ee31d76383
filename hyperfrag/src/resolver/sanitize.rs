//! Path segment sanitization
//!
//! Directory segments are folded into the key charset. The final segment keeps
//! more of its shape (case, dots) but loses accents and every character that
//! has meaning to a filesystem or a shell.

/// Fold a directory segment (or namespace) into lowercase `[a-z0-9_-]`
#[must_use]
pub fn sanitize_key(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

const SPECIAL_CHARS: &[char] = &[
    '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*', '(',
    ')', '|', '~', '`', '!', '{', '}', '%', '+', '^', '@', '\u{2019}', '\u{ab}', '\u{bb}',
    '\u{201d}', '\u{201c}', '\u{a0}',
];

/// Turn the final identifier segment into a safe file stem
///
/// Accents are transliterated, special characters removed, whitespace runs
/// become a single `-`, and leading or trailing `.`, `-` and `_` are trimmed,
/// so the stem can never be a dot segment or a hidden file.
#[must_use]
pub fn sanitize_file_name(segment: &str) -> String {
    let transliterated = remove_accents(segment);

    let mut stem = String::with_capacity(transliterated.len());
    let mut pending_dash = false;

    for c in transliterated.chars() {
        if c.is_control() || SPECIAL_CHARS.contains(&c) {
            continue;
        }
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
            continue;
        }
        if pending_dash && !stem.is_empty() {
            stem.push('-');
        }
        pending_dash = false;
        stem.push(c);
    }

    stem.trim_matches(|c| matches!(c, '.' | '-' | '_'))
        .to_string()
}

/// Transliterate common Latin accented characters to ASCII
#[must_use]
pub fn remove_accents(input: &str) -> String {
    if input.is_ascii() {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match transliterate(c) {
            Some(ascii) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}

const fn transliterate(c: char) -> Option<&'static str> {
    let ascii = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' | 'ª' => "a",
        'Æ' => "AE",
        'æ' => "ae",
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'Ð' | 'Ď' | 'Đ' => "D",
        'ð' | 'ď' | 'đ' => "d",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "G",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'Ĥ' | 'Ħ' => "H",
        'ĥ' | 'ħ' => "h",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "I",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ĳ' => "IJ",
        'ĳ' => "ij",
        'Ĵ' => "J",
        'ĵ' => "j",
        'Ķ' => "K",
        'ķ' | 'ĸ' => "k",
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "L",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' | 'Ŋ' => "N",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŉ' | 'ŋ' => "n",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' | 'º' => "o",
        'Œ' => "OE",
        'œ' => "oe",
        'Ŕ' | 'Ŗ' | 'Ř' => "R",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'Ś' | 'Ŝ' | 'Ş' | 'Š' | 'Ș' => "S",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ș' | 'ſ' => "s",
        'ß' => "ss",
        'Ţ' | 'Ť' | 'Ŧ' | 'Ț' => "T",
        'ţ' | 'ť' | 'ŧ' | 'ț' => "t",
        'Þ' => "TH",
        'þ' => "th",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ŵ' => "W",
        'ŵ' => "w",
        'Ý' | 'Ŷ' | 'Ÿ' => "Y",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Partials"), "partials");
        assert_eq!(sanitize_key("my dir!"), "mydir");
        assert_eq!(sanitize_key("a_b-c"), "a_b-c");
        assert_eq!(sanitize_key(".."), "");
        assert_eq!(sanitize_key("über"), "ber");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("datastar-demo"), "datastar-demo");
        assert_eq!(sanitize_file_name("my file  name"), "my-file-name");
        assert_eq!(sanitize_file_name("bad<>name?"), "badname");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name("..."), "");
        assert_eq!(sanitize_file_name("--x--"), "x");
        assert_eq!(sanitize_file_name("a\\b"), "ab");
    }

    #[test]
    fn test_sanitize_file_name_strips_accents() {
        assert_eq!(sanitize_file_name("café-menü"), "cafe-menu");
        assert_eq!(sanitize_file_name("Straße"), "Strasse");
    }

    #[test]
    fn test_remove_accents_passthrough() {
        assert_eq!(remove_accents("plain"), "plain");
        assert_eq!(remove_accents("日本"), "日本");
    }
}
