use std::collections::HashSet;

/// Something with a stable opaque identifier.
pub trait HasUid {
    fn uid(&self) -> &str;
}

impl HasUid for crate::models::Chat {
    fn uid(&self) -> &str {
        &self.uid
    }
}

impl HasUid for crate::models::ChatMessage {
    fn uid(&self) -> &str {
        &self.uid
    }
}

/// Returns the items of `incoming` whose uid is neither in `existing` nor
/// repeated earlier in `incoming`, preserving order.
pub fn unseen<T: HasUid>(existing: &[T], incoming: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<String> = existing.iter().map(|item| item.uid().to_string()).collect();
    incoming
        .into_iter()
        .filter(|item| seen.insert(item.uid().to_string()))
        .collect()
}

pub fn contains_uid<T: HasUid>(items: &[T], uid: &str) -> bool {
    items.iter().any(|item| item.uid() == uid)
}
