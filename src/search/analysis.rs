//! Text analysis shared by the embedded engine's index and query paths.
//!
//! The Elasticsearch mapping declares `name.partial` (edge n-grams) and
//! `name.metaphone` (phonetic codes) sub-fields and lets the cluster's
//! analyzers expand them. The embedded engine has no such analyzers, so it
//! expands both forms here when a document is built and encodes query words
//! with the same functions.

/// Shortest prefix emitted for a word
pub const MIN_GRAM: usize = 2;

/// Longest prefix emitted for a word
pub const MAX_GRAM: usize = 15;

/// Maximum length of a phonetic code
pub const MAX_CODE_LEN: usize = 4;

/// Lowercased alphanumeric words of `text`
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Edge n-grams of every word, `MIN_GRAM..=MAX_GRAM` characters long
pub fn edge_ngrams(text: &str) -> Vec<String> {
    let mut grams = Vec::new();
    for word in words(text) {
        let chars: Vec<char> = word.chars().collect();
        let longest = chars.len().min(MAX_GRAM);
        for len in MIN_GRAM..=longest {
            grams.push(chars[..len].iter().collect());
        }
    }
    grams
}

/// Word as it is looked up against the partial field
pub fn partial_term(word: &str) -> String {
    word.chars().take(MAX_GRAM).collect()
}

/// Phonetic codes of every word that produces one
pub fn metaphone_codes(text: &str) -> Vec<String> {
    words(text)
        .map(|w| metaphone(&w))
        .filter(|code| !code.is_empty())
        .collect()
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'A' | 'E' | 'I' | 'O' | 'U')
}

fn is_front_vowel(c: char) -> bool {
    matches!(c, 'E' | 'I' | 'Y')
}

/// Metaphone code of a single word.
///
/// Letters outside A-Z carry no sound information and are skipped.
pub fn metaphone(word: &str) -> String {
    let mut letters: Vec<char> = word
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return String::new();
    }

    // Silent or merged leading pairs
    match (letters.first().copied(), letters.get(1).copied()) {
        (Some('A'), Some('E'))
        | (Some('G'), Some('N'))
        | (Some('K'), Some('N'))
        | (Some('P'), Some('N'))
        | (Some('W'), Some('R')) => {
            letters.remove(0);
        }
        (Some('W'), Some('H')) => {
            letters.remove(1);
        }
        (Some('X'), _) => letters[0] = 'S',
        _ => {}
    }

    let at = |i: usize| letters.get(i).copied();
    let mut code = String::new();

    for i in 0..letters.len() {
        if code.len() >= MAX_CODE_LEN {
            break;
        }

        let c = letters[i];
        let prev = if i > 0 { at(i - 1) } else { None };
        let next = at(i + 1);
        let after = at(i + 2);

        if c != 'C' && prev == Some(c) {
            continue;
        }

        match c {
            'A' | 'E' | 'I' | 'O' | 'U' => {
                if i == 0 {
                    code.push(c);
                }
            }
            'B' => {
                if !(prev == Some('M') && next.is_none()) {
                    code.push('B');
                }
            }
            'C' => {
                if next == Some('I') && after == Some('A') {
                    code.push('X');
                } else if next == Some('H') {
                    code.push(if prev == Some('S') { 'K' } else { 'X' });
                } else if next.map_or(false, is_front_vowel) {
                    if prev != Some('S') {
                        code.push('S');
                    }
                } else {
                    code.push('K');
                }
            }
            'D' => {
                if next == Some('G') && after.map_or(false, is_front_vowel) {
                    code.push('J');
                } else {
                    code.push('T');
                }
            }
            'G' => {
                let silent_gh = next == Some('H') && !after.map_or(true, is_vowel);
                let silent_gn = next == Some('N')
                    && (after.is_none() || (after == Some('E') && at(i + 3) == Some('D')));
                if silent_gh || silent_gn {
                    continue;
                }
                if next.map_or(false, is_front_vowel) {
                    code.push('J');
                } else {
                    code.push('K');
                }
            }
            'H' => {
                let after_modifier = matches!(prev, Some('C' | 'S' | 'P' | 'T' | 'G'));
                let between_vowel = prev.map_or(false, is_vowel) && !next.map_or(false, is_vowel);
                if !after_modifier && !between_vowel {
                    code.push('H');
                }
            }
            'K' => {
                if prev != Some('C') {
                    code.push('K');
                }
            }
            'P' => code.push(if next == Some('H') { 'F' } else { 'P' }),
            'Q' => code.push('K'),
            'S' => {
                if next == Some('H')
                    || (next == Some('I') && matches!(after, Some('O' | 'A')))
                {
                    code.push('X');
                } else {
                    code.push('S');
                }
            }
            'T' => {
                if next == Some('I') && matches!(after, Some('O' | 'A')) {
                    code.push('X');
                } else if next == Some('H') {
                    code.push('0');
                } else if !(next == Some('C') && after == Some('H')) {
                    code.push('T');
                }
            }
            'V' => code.push('F'),
            'W' | 'Y' => {
                if next.map_or(false, is_vowel) {
                    code.push(c);
                }
            }
            'X' => {
                code.push('K');
                code.push('S');
            }
            'Z' => code.push('S'),
            other => code.push(other),
        }
    }

    code.truncate(MAX_CODE_LEN);
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_ngrams_per_word() {
        let grams = edge_ngrams("Bat Mobile");
        assert_eq!(grams, vec!["ba", "bat", "mo", "mob", "mobi", "mobil", "mobile"]);
    }

    #[test]
    fn test_edge_ngrams_are_capped() {
        let grams = edge_ngrams("GreatProductWithAVeryLongName");
        assert_eq!(grams.last().map(|g| g.chars().count()), Some(MAX_GRAM));
        assert_eq!(partial_term("greatproductwithaverylongname"), "greatproductwit");
    }

    #[test]
    fn test_edge_ngrams_keep_non_ascii() {
        let grams = edge_ngrams("Prøduçt");
        assert!(grams.contains(&"prø".to_string()));
        assert!(grams.contains(&"prøduçt".to_string()));
    }

    #[test]
    fn test_metaphone_matches_similar_spellings() {
        assert_eq!(metaphone("Smith"), metaphone("Smyth"));
        assert_eq!(metaphone("phone"), metaphone("fone"));
        assert_eq!(metaphone("knight"), metaphone("night"));
        assert_ne!(metaphone("table"), metaphone("chair"));
    }

    #[test]
    fn test_metaphone_ignores_non_letters() {
        assert_eq!(metaphone("1234"), "");
        assert!(metaphone_codes("42 shirts").iter().all(|c| !c.is_empty()));
    }
}
