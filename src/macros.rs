//! Helper macros used across the crate.

/// Lazily compile a [`Regex`](regex::Regex) with a custom panic message.
///
/// # Examples
///
/// ```
/// use std::sync::LazyLock;
///
/// use regex::Regex;
/// static RE: LazyLock<Regex> = bbcodec::lazy_regex!(r"\[/?b\]", "bold tag");
/// assert!(RE.is_match("[b]x[/b]"));
/// ```
#[macro_export]
macro_rules! lazy_regex {
    ($pattern:expr, $msg:expr $(,)?) => {
        ::std::sync::LazyLock::new(|| ::regex::Regex::new($pattern).expect($msg))
    };
}

/// Collect string literals into a [`TagSet`](crate::TagSet).
///
/// ```
/// let set = bbcodec::tag_set!["b", "i"];
/// assert!(set.contains("b"));
/// ```
#[macro_export]
macro_rules! tag_set {
    ( $($elem:expr),* $(,)? ) => {
        {
            let set: $crate::TagSet = [ $( ::std::string::ToString::to_string(&$elem) ),* ]
                .into_iter()
                .collect();
            set
        }
    };
}
