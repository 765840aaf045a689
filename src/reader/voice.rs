//! Voice selection by language prefix.

use super::engine::Voice;

/// Pick a voice for `lang_prefix`: a local voice first, then any matching
/// voice. `None` means the engine default.
pub fn select_voice<'a>(voices: &'a [Voice], lang_prefix: &str) -> Option<&'a Voice> {
    let mut matching = voices.iter().filter(|v| v.lang.starts_with(lang_prefix));
    let first = matching.clone().next();
    matching.find(|v| v.local_service).or(first)
}
