use std::sync::atomic::{AtomicU64, Ordering};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// How many random base36 characters follow the time component.
const RANDOM_CHARS: usize = 6;

/// Last time component handed out, in milliseconds since the epoch.
static LAST_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Generates an opaque record ID: a base36 time component followed by
/// random base36 characters.
///
/// The time component is strictly increasing within this process, so two IDs
/// generated here never collide. IDs generated by another process could, in
/// theory, which is why the stores still refuse duplicate inserts.
#[must_use]
pub fn generate_id() -> String {
    let mut id = to_base36(next_millis());

    let mut bits = rand::random::<u64>();
    for _ in 0..RANDOM_CHARS {
        id.push(BASE36[(bits % 36) as usize] as char);
        bits /= 36;
    }

    id
}

fn next_millis() -> u64 {
    let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);

    // If the clock didn't move since the last call (or went backwards),
    // pretend it did.
    let previous = LAST_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);

    now.max(previous + 1)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return String::from("0");
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize] as char);
        value /= 36;
    }

    digits.into_iter().rev().collect()
}
