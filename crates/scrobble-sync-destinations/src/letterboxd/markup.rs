use once_cell::sync::Lazy;
use regex::Regex;

static FILM_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)film-poster.*?".*?data-film-id="(.*?)""#).expect("film id regex should compile")
});

/// Internal film id from a film page, e.g. `51315`.
pub fn film_id_from_markup(markup: &str) -> Option<&str> {
    FILM_ID
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_film_id_from_poster() {
        let markup = r#"<section class="poster-list"><div class="really-lazy-load poster film-poster film-poster-51568 linked-film-poster" data-image-width="230" data-film-id="51568" data-film-slug="fight-club" data-target-link="/film/fight-club/">"#;
        assert_eq!(film_id_from_markup(markup), Some("51568"));
    }

    #[test]
    fn test_case_insensitive_and_ungreedy() {
        let markup = r#"<DIV class="Film-Poster" DATA-FILM-ID="42" data-other="x"></DIV><div data-film-id="7">"#;
        assert_eq!(film_id_from_markup(markup), Some("42"));
    }

    #[test]
    fn test_missing_poster() {
        assert_eq!(film_id_from_markup("<html><body>Sorry, we can’t find the page</body></html>"), None);
        assert_eq!(film_id_from_markup(r#"<div class="film-poster" data-film-id="">"#), None);
    }
}
