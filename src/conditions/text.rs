use stringmatch::Needle;

use crate::condition::Observation;

/// Satisfied once the fetched text matches `needle`. Yields the matching text.
///
/// Any `stringmatch` needle works: a plain string for an exact match, a
/// `StringMatch` for partial or case-insensitive matching, or a `Regex`.
pub fn text_matches<F, N>(mut fetch: F, needle: N) -> impl FnMut() -> Observation<String>
where
    F: FnMut() -> Observation<String>,
    N: Needle,
{
    move || match fetch() {
        Observation::Satisfied(text) if needle.is_match(&text) => Observation::Satisfied(text),
        Observation::Satisfied(_) | Observation::NotYet => Observation::NotYet,
        Observation::Failed(e) => Observation::Failed(e),
    }
}

/// Satisfied once the fetched text no longer matches `needle`, e.g. "Loading...".
pub fn text_lacks<F, N>(mut fetch: F, needle: N) -> impl FnMut() -> Observation<String>
where
    F: FnMut() -> Observation<String>,
    N: Needle,
{
    move || match fetch() {
        Observation::Satisfied(text) if !needle.is_match(&text) => Observation::Satisfied(text),
        Observation::Satisfied(_) | Observation::NotYet => Observation::NotYet,
        Observation::Failed(e) => Observation::Failed(e),
    }
}
