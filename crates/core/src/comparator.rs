use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::AggregateNode;

/// Node property a column sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortProperty {
    SelfTime,
    TotalTime,
    FunctionName,
    Url,
    CallUid,
}

/// Stable handle to a memoized comparator.
///
/// Two requests for the same property and direction on one registry return
/// equal handles; sorting relies on that to skip subtrees that are already
/// in the requested order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComparatorId(u32);

#[derive(Debug, Clone, Copy)]
struct ComparatorSpec {
    property: SortProperty,
    ascending: bool,
}

/// Per-tree comparator cache, indexed by direction then property.
#[derive(Debug, Clone, Default)]
pub struct ComparatorRegistry {
    by_direction: [HashMap<SortProperty, ComparatorId>; 2],
    specs: Vec<ComparatorSpec>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property_comparator(&mut self, property: SortProperty, ascending: bool) -> ComparatorId {
        let slot = &mut self.by_direction[usize::from(ascending)];
        if let Some(&id) = slot.get(&property) {
            return id;
        }
        let id = ComparatorId(self.specs.len() as u32);
        self.specs.push(ComparatorSpec {
            property,
            ascending,
        });
        slot.insert(property, id);
        id
    }

    /// Property and direction behind a handle issued by this registry.
    pub fn describe(&self, id: ComparatorId) -> Option<(SortProperty, bool)> {
        self.specs
            .get(id.0 as usize)
            .map(|spec| (spec.property, spec.ascending))
    }

    /// Compare two nodes. Handles from another registry compare as equal.
    pub fn compare(&self, id: ComparatorId, lhs: &AggregateNode, rhs: &AggregateNode) -> Ordering {
        let Some(spec) = self.specs.get(id.0 as usize) else {
            return Ordering::Equal;
        };
        let ordering = match spec.property {
            SortProperty::SelfTime => compare_values(&lhs.self_time, &rhs.self_time),
            SortProperty::TotalTime => compare_values(&lhs.total_time, &rhs.total_time),
            SortProperty::FunctionName => compare_values(&lhs.function_name, &rhs.function_name),
            SortProperty::Url => compare_values(&lhs.url, &rhs.url),
            SortProperty::CallUid => compare_values(&lhs.call_uid, &rhs.call_uid),
        };
        if spec.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// `<` then `>`, equal otherwise; NaN therefore ties with everything.
fn compare_values<T: PartialOrd + ?Sized>(lhs: &T, rhs: &T) -> Ordering {
    if lhs < rhs {
        Ordering::Less
    } else if lhs > rhs {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}
