//! Shared location label
//!
//! The label is written by an external actor (ingest `LOCATION` lines or
//! `POST /location` on the admin server) and read by the notifier at
//! dispatch time. Constructed explicitly in main and shared via `Arc`.
//! Last write wins; a read that is stale by one update is acceptable
//! because the label changes rarely.

use parking_lot::RwLock;

pub struct LocationHolder {
    label: RwLock<String>,
}

impl LocationHolder {
    pub fn new(initial: impl Into<String>) -> Self {
        Self { label: RwLock::new(initial.into()) }
    }

    /// Current label (clone of the stored value)
    pub fn get(&self) -> String {
        self.label.read().clone()
    }

    /// Replace the label unconditionally
    pub fn set(&self, label: impl Into<String>) {
        *self.label.write() = label.into();
    }
}

impl Default for LocationHolder {
    fn default() -> Self {
        Self::new("0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label() {
        let holder = LocationHolder::default();
        assert_eq!(holder.get(), "0");
    }

    #[test]
    fn test_set_replaces_unconditionally() {
        let holder = LocationHolder::new("0");
        holder.set("LOT-7");
        assert_eq!(holder.get(), "LOT-7");
        holder.set("");
        assert_eq!(holder.get(), "");
    }
}
