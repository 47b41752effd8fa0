// src/classify/rel.rs
// =============================================================================
// rel="..." attribute analysis.
//
// rel is a whitespace-separated, case-insensitive token list. We only care
// about the three tokens search engines treat specially: nofollow,
// sponsored and ugc.
// =============================================================================

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelFlags {
    pub nofollow: bool,
    pub sponsored: bool,
    pub ugc: bool,
}

impl RelFlags {
    pub fn parse(rel: &str) -> Self {
        let mut flags = RelFlags::default();
        for token in rel.split_ascii_whitespace() {
            match token.to_ascii_lowercase().as_str() {
                "nofollow" => flags.nofollow = true,
                "sponsored" => flags.sponsored = true,
                "ugc" => flags.ugc = true,
                _ => {}
            }
        }
        flags
    }
}

// Reads the rel attribute straight off an anchor element
pub fn analyze_rel_attributes(element: &ElementRef) -> RelFlags {
    element
        .value()
        .attr("rel")
        .map(RelFlags::parse)
        .unwrap_or_default()
}

/// How many collected anchors carry each rel token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelTally {
    pub nofollow: usize,
    pub sponsored: usize,
    pub ugc: usize,
}

impl RelTally {
    pub fn add(&mut self, flags: RelFlags) {
        self.nofollow += usize::from(flags.nofollow);
        self.sponsored += usize::from(flags.sponsored);
        self.ugc += usize::from(flags.ugc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_parse_tokens() {
        let flags = RelFlags::parse("noopener NoFollow  ugc");
        assert!(flags.nofollow);
        assert!(flags.ugc);
        assert!(!flags.sponsored);
    }

    #[test]
    fn test_from_element() {
        let html = Html::parse_fragment(r#"<a href="/x" rel="sponsored nofollow">ad</a>"#);
        let selector = Selector::parse("a").unwrap();
        let anchor = html.select(&selector).next().unwrap();

        let flags = analyze_rel_attributes(&anchor);
        assert_eq!(
            flags,
            RelFlags {
                nofollow: true,
                sponsored: true,
                ugc: false
            }
        );
    }

    #[test]
    fn test_tally() {
        let mut tally = RelTally::default();
        tally.add(RelFlags::parse("nofollow"));
        tally.add(RelFlags::parse("nofollow ugc"));
        tally.add(RelFlags::default());
        assert_eq!(tally.nofollow, 2);
        assert_eq!(tally.ugc, 1);
        assert_eq!(tally.sponsored, 0);
    }
}
