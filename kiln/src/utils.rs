use std::collections::BTreeMap;
use std::fmt;

/// Controls what a missing staleness predicate means.
///
/// Loaders hand out an optional `up_to_date` callback together with the
/// template source.  When the callback is missing the environment has to
/// decide whether the cached template may be reused.  By default it is not:
/// the engine never assumes that a source it cannot check is stable, so such
/// templates are loaded and compiled again on every
/// [`get_template`](crate::Environment::get_template) call.
///
/// For more information see
/// [`set_freshness_policy`](crate::Environment::set_freshness_policy).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum FreshnessPolicy {
    /// Templates without a predicate are always considered stale.
    #[default]
    AssumeStale,
    /// Templates without a predicate stay cached until cleared.
    AssumeFresh,
}

impl FreshnessPolicy {
    /// Returns the freshness reported for a template without a predicate.
    pub(crate) fn is_fresh(self) -> bool {
        matches!(self, FreshnessPolicy::AssumeFresh)
    }
}

/// Escapes a string for use in HTML.
pub struct HtmlEscape<'a>(pub &'a str);

impl fmt::Display for HtmlEscape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let mut start = 0;

        // all escaped characters are ascii so the byte offsets are char boundaries
        for (i, b) in s.bytes().enumerate() {
            let quote = match b {
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'&' => "&amp;",
                b'"' => "&quot;",
                b'\'' => "&#x27;",
                b'/' => "&#x2f;",
                _ => continue,
            };
            if start < i {
                ok!(f.write_str(&s[start..i]));
            }
            ok!(f.write_str(quote));
            start = i + 1;
        }

        if start < s.len() {
            f.write_str(&s[start..])
        } else {
            Ok(())
        }
    }
}

pub struct BTreeMapKeysDebug<'a, K: fmt::Debug, V>(pub &'a BTreeMap<K, V>);

impl<K: fmt::Debug, V> fmt::Debug for BTreeMapKeysDebug<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|x| x.0)).finish()
    }
}

#[test]
fn test_html_escape() {
    let input = "<>&\"'/ünicode";
    let output = HtmlEscape(input).to_string();
    assert_eq!(output, "&lt;&gt;&amp;&quot;&#x27;&#x2f;ünicode");
    assert_eq!(HtmlEscape("plain").to_string(), "plain");
}

#[test]
fn test_freshness_default() {
    assert_eq!(FreshnessPolicy::default(), FreshnessPolicy::AssumeStale);
    assert!(!FreshnessPolicy::AssumeStale.is_fresh());
    assert!(FreshnessPolicy::AssumeFresh.is_fresh());
}
