use crate::model::track::Track;
use crate::queue::Queue;

/// Track autoplay starts from: the last played track, or the current one.
pub(crate) fn seed(queue: &Queue) -> Option<&Track> {
    queue.history().last().or(queue.current())
}

/// Identifier used to look for tracks related to `seed`.
///
/// Youtube tracks load their radio mix, anything else searches by author and title.
pub(crate) fn identifier(seed: &Track) -> String {
    let info = &seed.info;

    match info.source_name.as_str() {
        "youtube" if !info.identifier.is_empty() => format!(
            "https://www.youtube.com/watch?v={id}&list=RD{id}",
            id = info.identifier
        ),
        "spotify" | "applemusic" | "deezer" => format!("ytsearch:{} - {}", info.author, info.title),
        _ => format!("ytmsearch:{} - {}", info.author, info.title)
    }
}

/// Picks the first candidate that isn't the seed and wasn't queued or played already,
/// falling back to the first candidate.
pub(crate) fn pick(seed: &Track, candidates: &[Track], queue: &Queue) -> Option<Track> {
    candidates.iter()
        .find(|track| *track != seed && !queue.contains(track))
        .or_else(|| candidates.first())
        .cloned()
}
