use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::session::Slot;

/// Raw per-slot accumulated volume recordings for one symbol on one trading day
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayRecordings {
    pub date: NaiveDate,
    pub slots: BTreeMap<Slot, u64>,
}

impl DayRecordings {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, slots: BTreeMap::new() }
    }

    pub fn with_slots(date: NaiveDate, slots: impl IntoIterator<Item = (Slot, u64)>) -> Self {
        Self { date, slots: slots.into_iter().collect() }
    }
}

/// Forward-filled average accumulated volume per slot across `days`
///
/// A day's effective value at a slot is its most recent recording at or before that slot.
/// Days with no such recording do not contribute, and slots with no contributing day are
/// absent from the result rather than zero. Work is linear in `max_slot`, so callers bound it
/// by the session length.
pub fn compute_slot_averages(days: &[DayRecordings], max_slot: Slot) -> BTreeMap<Slot, f64> {
    let mut sums: Vec<f64> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();

    for day in days {
        let mut recordings = day.slots.range(..=max_slot).peekable();
        let Some(&(&first_slot, _)) = recordings.peek() else {
            continue;
        };
        let mut effective: Option<u64> = None;

        for slot in first_slot..=max_slot {
            while let Some((_, volume)) = recordings.next_if(|(recorded, _)| **recorded <= slot) {
                effective = Some(*volume);
            }
            let Some(volume) = effective else {
                continue;
            };
            if sums.len() <= slot {
                sums.resize(slot + 1, 0.0);
                counts.resize(slot + 1, 0);
            }
            sums[slot] += volume as f64;
            counts[slot] += 1;
        }
    }

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(slot, (sum, count))| (slot, sum / count as f64))
        .collect()
}
