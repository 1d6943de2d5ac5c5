//! Set operations over sorted posting lists

use std::cmp::Ordering;

use super::types::Posting;

/// Merge two sorted posting lists; equal entries appear once
pub fn union(a: &[Posting], b: &[Posting]) -> Vec<Posting> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                result.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                result.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Union of any number of sorted lists, merged pairwise
pub fn union_all(mut lists: Vec<Vec<Posting>>) -> Vec<Posting> {
    lists.retain(|list| !list.is_empty());

    while lists.len() > 1 {
        let mut merged = Vec::with_capacity((lists.len() + 1) / 2);
        let mut iter = lists.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => merged.push(union(&left, &right)),
                None => merged.push(left),
            }
        }
        lists = merged;
    }

    lists.pop().unwrap_or_default()
}

/// Ascending distinct document ids of a sorted posting list
pub fn distinct_ids(postings: &[Posting]) -> Vec<u32> {
    let mut ids: Vec<u32> = Vec::new();
    for posting in postings {
        if ids.last() != Some(&posting.doc_id) {
            ids.push(posting.doc_id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn list(pairs: &[(u32, u32)]) -> Vec<Posting> {
        pairs.iter().map(|&(d, p)| Posting::new(d, p)).collect()
    }

    #[test]
    fn test_union_merges_and_collapses() {
        let a = list(&[(1, 0), (1, 4), (3, 2)]);
        let b = list(&[(1, 4), (2, 1), (3, 0)]);
        assert_eq!(
            union(&a, &b),
            list(&[(1, 0), (1, 4), (2, 1), (3, 0), (3, 2)])
        );
    }

    #[test]
    fn test_union_laws() {
        let a = list(&[(1, 1), (4, 0), (9, 3)]);
        let b = list(&[(0, 5), (4, 0), (4, 2)]);
        let c = list(&[(2, 2), (9, 3), (10, 0)]);

        assert_eq!(union(&a, &b), union(&b, &a));
        assert_eq!(union(&union(&a, &b), &c), union(&a, &union(&b, &c)));
        assert_eq!(union(&a, &a), a);
        assert_eq!(union(&a, &[]), a);
        assert_eq!(union(&[], &a), a);
    }

    #[test]
    fn test_union_all() {
        let lists = vec![
            list(&[(5, 0)]),
            Vec::new(),
            list(&[(1, 0), (5, 0)]),
            list(&[(3, 3)]),
            list(&[(0, 1)]),
        ];
        assert_eq!(
            union_all(lists),
            list(&[(0, 1), (1, 0), (3, 3), (5, 0)])
        );
        assert!(union_all(Vec::new()).is_empty());
    }

    #[test]
    fn test_distinct_ids_of_union() {
        let a = list(&[(1, 0), (1, 1), (6, 0)]);
        let b = list(&[(2, 0), (6, 4), (6, 9)]);

        let expected: BTreeSet<u32> = distinct_ids(&a)
            .into_iter()
            .chain(distinct_ids(&b))
            .collect();
        assert_eq!(
            distinct_ids(&union(&a, &b)),
            expected.into_iter().collect::<Vec<_>>()
        );
        assert_eq!(distinct_ids(&a), vec![1, 6]);
    }
}
