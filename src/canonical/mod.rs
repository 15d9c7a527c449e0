//! Canonical card filenames.
//!
//! The game looks textures up by re-deriving `{number}_{rarity}_{name}.png` from its own copy of the
//! metadata, so every name written to disk has to come out of [`normalize`] and nothing else.

use std::collections::HashMap;

use itertools::Itertools;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use metadata::{canonicalize_set_metadata, load_metadata, write_metadata, CardsMetadata, MetadataOutcome};
pub use reconcile::{reconcile_filenames, Conflict, ReconcileReport};

pub mod metadata;
pub mod reconcile;

const ACCENT_FOLDS: &[(&str, &str)] = &[
    ("àáâãäåāăą", "a"),
    ("çćĉċč", "c"),
    ("ďđð", "d"),
    ("èéêëēĕėęě", "e"),
    ("ĝğġģ", "g"),
    ("ĥħ", "h"),
    ("ìíîïĩīĭįı", "i"),
    ("ĵ", "j"),
    ("ķ", "k"),
    ("ĺļľŀł", "l"),
    ("ñńņňŉ", "n"),
    ("òóôõöøōŏő", "o"),
    ("ŕŗř", "r"),
    ("śŝşšș", "s"),
    ("ţťŧț", "t"),
    ("ùúûüũūŭůűų", "u"),
    ("ŵ", "w"),
    ("ýÿŷ", "y"),
    ("źżž", "z"),
    ("ß", "ss"),
    ("æ", "ae"),
    ("œ", "oe"),
    ("þ", "th"),
    // Nidoran and friends
    ("♀", "f"),
    ("♂", "m"),
];

static ACCENT_TABLE: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    ACCENT_FOLDS.iter()
        .flat_map(|(accented, plain)| accented.chars().map(move |c| (c, *plain)))
        .collect()
});

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Lowercase, ASCII-folded, underscore-delimited form of `raw`. Total over every input and idempotent.
///
/// Rules, in order: lowercase; drop apostrophes; space, `-`, `.`, `/` and `\` become `_`;
/// accented letters fold to ASCII; `: , ! ( ) "` are dropped and `&` becomes `and`;
/// runs of `_` collapse and are trimmed. Characters no rule knows pass through untouched.
pub fn normalize(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());

    // Every rule looks at a single character, so one pass applies them in order.
    for c in raw.to_lowercase().chars() {
        match c {
            '\'' | '\u{2018}' | '\u{2019}' => {}
            ' ' | '-' | '.' | '/' | '\\' => output.push('_'),
            c if is_combining_mark(c) => {}
            ':' | ',' | '!' | '(' | ')' | '"' => {}
            '&' => output.push_str("and"),
            c => match ACCENT_TABLE.get(&c) {
                Some(plain) => output.push_str(plain),
                None => output.push(c),
            },
        }
    }

    output.split('_')
        .filter(|part| !part.is_empty())
        .join("_")
}

/// Pads purely numeric card numbers to three digits; promo codes like `TG05` are returned as they are.
pub fn canonical_number(number: &str) -> String {
    let number = number.trim();

    if !number.is_empty() && number.bytes().all(|byte| byte.is_ascii_digit()) {
        let significant = number.trim_start_matches('0');
        format!("{:0>3}", if significant.is_empty() { "0" } else { significant })
    } else {
        number.to_string()
    }
}

pub fn build_canonical_filename(number: &str, rarity: &str, name: &str) -> String {
    let stem = [canonical_number(number), normalize(rarity), normalize(name)].into_iter()
        .filter(|part| !part.is_empty())
        .join("_");

    format!("{stem}.png")
}

const MAX_CANONICAL_PASSES: usize = 8;

fn canonical_stem(stem: &str) -> String {
    match stem.split_once('_') {
        Some((number, rest)) if !number.is_empty() => {
            [canonical_number(number), normalize(rest)].into_iter()
                .filter(|part| !part.is_empty())
                .join("_")
        }
        _ => normalize(stem),
    }
}

/// Canonical form of a filename already on disk, assuming the `{number}_{rest}` layout.
///
/// Applying it to its own output changes nothing.
pub fn canonical_file_name(file_name: &str) -> String {
    let stem = match file_name.len().checked_sub(4) {
        Some(split) if file_name.is_char_boundary(split) && file_name[split..].eq_ignore_ascii_case(".png") => &file_name[..split],
        _ => file_name,
    };

    // `_5_Snivy` or `5 Snivy` only reveal their number prefix after one normalization, so repeat until stable.
    let mut stem = stem.to_string();

    for _ in 0..MAX_CANONICAL_PASSES {
        let next = canonical_stem(&stem);

        if next == stem {
            break;
        }

        stem = next;
    }

    format!("{stem}.png")
}

/// One catalog entry as the game reads it from `cards_metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    pub number: String,
    pub rarity: String,
}

impl CardRecord {
    pub fn canonical_filename(&self) -> String {
        build_canonical_filename(&self.number, &self.rarity, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accented_names_fold_to_ascii() {
        assert_eq!(build_canonical_filename("5", "Rare Holo", "Flabébé"), "005_rare_holo_flabebe.png");
        assert_eq!(normalize("Pokémon Center Lady"), "pokemon_center_lady");
        assert_eq!(normalize("Ülrich's Höhle"), "ulrichs_hohle");
    }

    #[test]
    fn decomposed_accents_match_precomposed_ones() {
        assert_eq!(normalize("Flabe\u{301}be\u{301}"), normalize("Flabébé"));
    }

    #[test]
    fn gender_symbols_are_spelled_out() {
        assert_eq!(build_canonical_filename("32", "Common", "Nidoran♀"), "032_common_nidoranf.png");
        assert_eq!(build_canonical_filename("29", "Common", "Nidoran♂"), "029_common_nidoranm.png");
    }

    #[test]
    fn punctuation_rules() {
        assert_eq!(normalize("Farfetch’d"), "farfetchd");
        assert_eq!(normalize("Mr. Mime"), "mr_mime");
        assert_eq!(normalize("Porygon-Z"), "porygon_z");
        assert_eq!(normalize("Pikachu & Zekrom-GX"), "pikachu_and_zekrom_gx");
        assert_eq!(normalize("Professor's Research (Professor Oak)"), "professors_research_professor_oak");
        assert_eq!(normalize("Boss's Orders: \"Giovanni\"!"), "bosss_orders_giovanni");
        assert_eq!(normalize("Type: Null"), "type_null");
        assert_eq!(normalize("  -Leading. and trailing-  "), "leading_and_trailing");
        assert_eq!(normalize("Rocket's/Team"), "rockets_team");
    }

    #[test]
    fn unknown_characters_pass_through() {
        assert_eq!(normalize("Ω Sigil ☆"), "ω_sigil_☆");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("___"), "");
    }

    #[test]
    fn card_numbers() {
        assert_eq!(canonical_number("5"), "005");
        assert_eq!(canonical_number("0005"), "005");
        assert_eq!(canonical_number("172"), "172");
        assert_eq!(canonical_number("1234"), "1234");
        assert_eq!(canonical_number("0"), "000");
        assert_eq!(canonical_number("TG05"), "TG05");
        assert_eq!(canonical_number("SWSH001"), "SWSH001");
    }

    #[test]
    fn empty_parts_do_not_leave_double_underscores() {
        assert_eq!(build_canonical_filename("12", "", "Pikachu"), "012_pikachu.png");
    }

    #[test]
    fn on_disk_names_converge_to_built_names() {
        assert_eq!(canonical_file_name("005_Rare_Holo_Flabébé.png"), "005_rare_holo_flabebe.png");
        assert_eq!(canonical_file_name("5_rare_holo_flabebe.PNG"), "005_rare_holo_flabebe.png");
        assert_eq!(canonical_file_name("TG05_Rare Holo_Pikachu.png"), "TG05_rare_holo_pikachu.png");
        assert_eq!(canonical_file_name("005 Rare Holo Flabébé.png"), "005_rare_holo_flabebe.png");
        assert_eq!(canonical_file_name("_5_Common_Snivy.png"), "005_common_snivy.png");
        assert_eq!(canonical_file_name("5 Common Snivy.png"), "005_common_snivy.png");

        for (number, rarity, name) in [("5", "Rare Holo", "Flabébé"), ("TG05", "Rare Holo V", "Pikachu V"), ("188", "Rare Secret", "Mew ex")] {
            let built = build_canonical_filename(number, rarity, name);
            assert_eq!(canonical_file_name(&built), built);
        }
    }

    /// Small xorshift so the sampled inputs are the same on every run.
    fn sample_strings(count: usize) -> Vec<String> {
        let alphabet = "aZ9 -.'’‘éèàüöäÉÀ♀♂:,!()\"&_/ßÆœ☆Ωñ\u{301}".chars().collect::<Vec<_>>();
        let mut state = 0x9E37_79B9_u32;

        (0..count)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let length = (state % 24) as usize;

                (0..length)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 17;
                        state ^= state << 5;
                        alphabet[state as usize % alphabet.len()]
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn normalize_is_deterministic_total_and_idempotent() {
        for raw in sample_strings(500) {
            let once = normalize(&raw);

            assert_eq!(once, normalize(&raw));
            assert_eq!(normalize(&once), once, "input {raw:?}");
            assert!(!once.starts_with('_') && !once.ends_with('_') && !once.contains("__"));
            assert!(!once.chars().any(|c| " -.'’‘:,!()\"&/".contains(c)), "input {raw:?} gave {once:?}");
        }
    }

    #[test]
    fn canonical_file_names_are_fixed_points() {
        for raw in sample_strings(500) {
            let once = canonical_file_name(&format!("{raw}.png"));

            assert_eq!(canonical_file_name(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn built_filenames_are_stable_under_reconciliation() {
        let samples = sample_strings(300);

        for chunk in samples.chunks(3) {
            if let [number, rarity, name] = chunk {
                let built = build_canonical_filename(number, rarity, name);

                assert_eq!(built, build_canonical_filename(number, rarity, name));

                let number_part = canonical_number(number);
                let has_tail = !normalize(rarity).is_empty() || !normalize(name).is_empty();

                if !number_part.is_empty() && !number_part.contains('_') && has_tail {
                    assert_eq!(canonical_file_name(&built), built, "from {number:?} {rarity:?} {name:?}");
                }
            }
        }
    }
}
