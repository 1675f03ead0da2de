//! Finding URLs in free-form message text

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:[-\w.]|%[0-9a-f]{2})+\S*").expect("URL pattern is valid")
});

/// Lazily yields every well-formed absolute URL in `text`, in order of appearance.  Duplicates are
/// kept.  Call again to start over.
pub fn extract(text: &str) -> Urls<'_> {
    Urls {
        matches: URL_PATTERN.find_iter(text),
    }
}

pub struct Urls<'a> {
    matches: regex::Matches<'static, 'a>,
}

impl Iterator for Urls<'_> {
    type Item = Url;

    fn next(&mut self) -> Option<Url> {
        self.matches
            .by_ref()
            .find_map(|candidate| parse_candidate(candidate.as_str()))
    }
}

fn parse_candidate(candidate: &str) -> Option<Url> {
    let url = Url::parse(trim_trailing(candidate)).ok()?;
    url.host().is_some().then_some(url)
}

/// Drop punctuation and markup that ends a sentence rather than the URL, e.g. the `.` in
/// "read https://a.com/x." or the `>` in Discord's embed-suppressing `<https://a.com/x>`.
fn trim_trailing(candidate: &str) -> &str {
    let mut end = candidate.len();

    while let Some(last) = candidate[..end].chars().next_back() {
        let head = &candidate[..end];
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '>' | '*' | '|' => true,
            // Keep parentheses that belong to the URL, e.g. wikipedia's `Foo_(bar)`.
            ')' => head.matches('(').count() < head.matches(')').count(),
            ']' => head.matches('[').count() < head.matches(']').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }

    &candidate[..end]
}
