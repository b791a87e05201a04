// Wordbound blank combining for post-generation.

use std::collections::VecDeque;

/// Fold the queued `[[...]]` opening blanks into one combined block
/// `[[a; b; c]]`, consuming every complete `[[..]] ... [[/]]` pair from
/// the queue.
///
/// An opening blank whose closer has not arrived yet is left at the front
/// of the queue. Returns the combined block (empty if there was nothing
/// to combine) and whether an ending `[[/]]` must be written after the
/// word it attaches to.
pub fn combine_wblanks(queue: &mut VecDeque<String>) -> (String, bool) {
    let mut combined = String::new();
    let mut last_wblank = String::new();

    while let Some(front) = queue.pop_front() {
        if front == "[[/]]" {
            if combined.is_empty() {
                combined.push_str("[[");
            } else if combined.len() > 2 {
                combined.push_str("; ");
            }
            // strip the [[ ]] brackets of the opener
            if last_wblank.len() >= 4 {
                combined.push_str(&last_wblank[2..last_wblank.len() - 2]);
            }
            last_wblank.clear();
        } else {
            last_wblank = front;
        }
    }

    if !last_wblank.is_empty() {
        queue.push_front(last_wblank);
    }

    if combined.is_empty() {
        (combined, false)
    } else {
        combined.push_str("]]");
        (combined, true)
    }
}
