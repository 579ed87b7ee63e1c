//! Edit-distance lookup for rooms and DJ names
//!
//! All comparisons run over a normalized form: uppercased, whitespace
//! stripped, and every non-ASCII character replaced by a `*` placeholder so
//! emoji in room names still contribute to length and distance instead of
//! vanishing.

/// Queries at or below this length (after normalization) are refused
pub const MIN_QUERY_LEN: usize = 2;

/// Max distance for bare free-text room lookup
pub const ROOM_DISTANCE_MAX: usize = 3;

/// Max distance for slash-prefixed explicit room commands
pub const ROOM_DISTANCE_MAX_SLASH: usize = 6;

/// Uppercase, drop whitespace, replace non-ASCII with `*`.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c.is_ascii() { c.to_ascii_uppercase() } else { '*' })
        .collect()
}

/// Levenshtein distance over normalized representations.
pub fn edit_distance(query: &str, target: &str) -> usize {
    strsim::levenshtein(&normalize(query), &normalize(target))
}

/// Distance after truncating both normalized strings to the shorter length.
///
/// Used for DJ-name word matching, where the query is usually a prefix.
pub fn prefix_distance(query: &str, target: &str) -> usize {
    let a = normalize(query);
    let b = normalize(target);
    let n = a.len().min(b.len());
    strsim::levenshtein(&a[..n], &b[..n])
}

/// Find the closest room within `max_distance`, ties going to the
/// first-seen candidate. Returns the index and name of the winner.
pub fn best_room<'a>(
    rooms: &'a [String],
    query: &str,
    max_distance: usize,
) -> Option<(usize, &'a str)> {
    let mut best: Option<(usize, &'a str)> = None;
    let mut best_distance = max_distance + 1;
    for (index, room) in rooms.iter().enumerate() {
        let distance = edit_distance(query, room);
        if distance <= max_distance && distance < best_distance {
            best_distance = distance;
            best = Some((index, room));
        }
    }
    best
}
