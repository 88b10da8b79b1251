//! Name ordering for German-language boards.
//!
//! Case and diacritics are folded away before comparing (DIN 5007 variant 1:
//! "Ä" sorts as "A", "ß" as "ss"). Names that fold identically fall back to a
//! plain comparison so the order is total.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub fn fold(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .replace('ß', "ss")
}

pub fn compare(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umlauts_sort_with_base_letter() {
        let mut names = vec!["Zander", "Öztürk", "Ohm", "Adler", "Bauer", "Ärmel"];
        names.sort_by(|a, b| compare(a, b));
        assert_eq!(names, vec!["Adler", "Ärmel", "Bauer", "Ohm", "Öztürk", "Zander"]);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(compare("adler", "Bauer"), Ordering::Less);
        assert_eq!(fold("  Groß "), "gross");
    }

    #[test]
    fn folded_ties_are_still_ordered() {
        assert_ne!(compare("Muller", "Müller"), Ordering::Equal);
        assert_eq!(compare("Müller", "Müller"), Ordering::Equal);
    }
}
