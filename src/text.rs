use unicode_normalization::UnicodeNormalization;

/// Decomposes accented characters and drops whatever is left outside ASCII,
/// so `març` becomes `marc` and `Sí` becomes `Si`.
pub fn fold_diacritics(value: &str) -> String {
    value.nfkd().filter(char::is_ascii).collect()
}

/// Lower-cased, diacritic-free, single-spaced form used for matching.
pub fn match_form(value: &str) -> String {
    fold_diacritics(value)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_catalan_and_spanish_accents() {
        assert_eq!(fold_diacritics("març"), "marc");
        assert_eq!(fold_diacritics("Sí"), "Si");
        assert_eq!(fold_diacritics("otoño"), "otono");
    }

    #[test]
    fn match_form_collapses_case_and_spacing() {
        assert_eq!(match_form("  Run   Breakfast Élche "), "run breakfast elche");
    }

    #[test]
    fn title_cases_each_word() {
        assert_eq!(title_case("new year  RUNBREAKFAST"), "New Year Runbreakfast");
        assert_eq!(title_case(""), "");
    }
}
