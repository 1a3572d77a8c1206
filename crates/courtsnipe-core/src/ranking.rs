use crate::model::BookableUnit;

/// Order free courts by preference.
///
/// Preferred courts that are free come first, in preference order; the rest
/// follow in their original order. Membership of `free` is never changed.
pub fn rank(free: &[BookableUnit], preferences: &[BookableUnit]) -> Vec<BookableUnit> {
    let mut ordered: Vec<BookableUnit> = Vec::with_capacity(free.len());

    for preferred in preferences {
        if free.contains(preferred) && !ordered.contains(preferred) {
            ordered.push(preferred.clone());
        }
    }
    for unit in free {
        if !ordered.contains(unit) {
            ordered.push(unit.clone());
        }
    }

    ordered
}
