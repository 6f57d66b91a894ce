//! Address filters.

use crate::addressing::AddressBookEntry;
use crate::operation::Operation;

/// Decides whether an address book entry is relevant for an operation.
///
/// Filters are pure: they must not depend on each other or on call order.
pub trait AddressFilter: Send + Sync {
    fn name(&self) -> &str;

    fn query_accept_entry(&self, operation: &Operation, entry: &AddressBookEntry) -> bool;
}

/// Accepts entries that share a loop code with the operation.
///
/// Operations without loops accept every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByLoopAddressFilter;

impl AddressFilter for ByLoopAddressFilter {
    fn name(&self) -> &str {
        "ByLoop"
    }

    fn query_accept_entry(&self, operation: &Operation, entry: &AddressBookEntry) -> bool {
        operation.loops.is_empty() || operation.loops.intersects(entry.loops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{EntryData, EntryDataItem, LoopEntryObject};
    use chrono::NaiveDateTime;

    fn entry(loops: &[&str]) -> AddressBookEntry {
        loops.iter().fold(AddressBookEntry::new("Test", "Entry"), |e, code| {
            e.with_item(EntryDataItem::new(EntryData::Loop(LoopEntryObject {
                code: code.to_string(),
            })))
        })
    }

    fn operation(loops: &str) -> Operation {
        let mut op = Operation::new(NaiveDateTime::default());
        op.loops.extend_delimited(loops);
        op
    }

    #[test]
    fn accepts_anything_when_operation_has_no_loops() {
        let filter = ByLoopAddressFilter;
        assert!(filter.query_accept_entry(&operation(""), &entry(&[])));
        assert!(filter.query_accept_entry(&operation(""), &entry(&["A"])));
    }

    #[test]
    fn rejects_disjoint_loops() {
        assert!(!ByLoopAddressFilter.query_accept_entry(&operation("B"), &entry(&["A"])));
    }

    #[test]
    fn accepts_intersecting_loops() {
        assert!(ByLoopAddressFilter.query_accept_entry(&operation("B;C"), &entry(&["A", "c"])));
    }

    #[test]
    fn entry_without_loops_is_rejected_when_operation_has_loops() {
        assert!(!ByLoopAddressFilter.query_accept_entry(&operation("A"), &entry(&[])));
    }

    #[test]
    fn disabled_loop_items_do_not_count() {
        let entry = AddressBookEntry::new("Test", "Entry").with_item(EntryDataItem::disabled(
            EntryData::Loop(LoopEntryObject {
                code: "A".to_string(),
            }),
        ));
        assert!(!ByLoopAddressFilter.query_accept_entry(&operation("A"), &entry));
    }
}
