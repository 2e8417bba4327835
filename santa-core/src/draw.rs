use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Member, Pairing};

/// Draws a derangement of `members`: every member gives to exactly one other
/// member and receives from exactly one other member.
///
/// Fewer than two members yield no pairings. Members must be pairwise
/// distinct, otherwise no fixed-point-free arrangement exists.
pub fn generate<R: Rng + ?Sized>(members: &[Member], rng: &mut R) -> Vec<Pairing> {
    generate_with(members, |receivers| receivers.shuffle(rng))
}

/// Same as [`generate`], with the permutation source supplied by the caller.
///
/// `shuffle` is called on the candidate receiver list until the result has
/// no position where giver and receiver coincide. There is no retry limit.
pub fn generate_with<F>(members: &[Member], mut shuffle: F) -> Vec<Pairing>
where
    F: FnMut(&mut [Member]),
{
    if members.len() < 2 {
        return Vec::new();
    }
    debug_assert!(
        crate::all_distinct(members),
        "derangement requested over duplicate members"
    );

    let mut receivers = members.to_vec();
    loop {
        shuffle(&mut receivers);
        if members.iter().zip(&receivers).all(|(g, r)| g != r) {
            break;
        }
    }

    members
        .iter()
        .cloned()
        .zip(receivers)
        .map(|(giver, receiver)| Pairing { giver, receiver })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn names(list: &[&str]) -> Vec<Member> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn assert_derangement(members: &[Member], pairings: &[Pairing]) {
        assert_eq!(pairings.len(), members.len());
        let givers: HashSet<_> = pairings.iter().map(|p| &p.giver).collect();
        let receivers: HashSet<_> = pairings.iter().map(|p| &p.receiver).collect();
        let expected: HashSet<_> = members.iter().collect();
        assert_eq!(givers, expected);
        assert_eq!(receivers, expected);
        assert!(pairings.iter().all(|p| p.giver != p.receiver));
    }

    #[test]
    fn fewer_than_two_members_yield_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(generate(&[], &mut rng).is_empty());
        assert!(generate(&names(&["solo"]), &mut rng).is_empty());
    }

    #[test]
    fn two_members_always_swap() {
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let pairings = generate(&names(&["ana", "bruno"]), &mut rng);
            assert_eq!(
                pairings,
                vec![
                    Pairing {
                        giver: "ana".into(),
                        receiver: "bruno".into()
                    },
                    Pairing {
                        giver: "bruno".into(),
                        receiver: "ana".into()
                    },
                ]
            );
        }
    }

    #[test]
    fn givers_keep_member_order() {
        let members = names(&["c", "a", "b", "d"]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let givers: Vec<_> = generate(&members, &mut rng)
            .into_iter()
            .map(|p| p.giver)
            .collect();
        assert_eq!(givers, members);
    }

    #[test]
    fn retries_until_no_fixed_point() {
        let members = names(&["a", "b", "c"]);
        // identity, then one fixed point, then a rotation
        let mut script = vec![
            names(&["a", "b", "c"]),
            names(&["a", "c", "b"]),
            names(&["b", "c", "a"]),
        ]
        .into_iter();
        let mut calls = 0;

        let pairings = generate_with(&members, |receivers| {
            calls += 1;
            let next = script.next().expect("script exhausted");
            receivers.clone_from_slice(&next);
        });

        assert_eq!(calls, 3);
        assert_derangement(&members, &pairings);
        assert_eq!(pairings[0].receiver, "b");
        assert_eq!(pairings[2].receiver, "a");
    }

    #[test]
    fn accepts_first_valid_shuffle() {
        let members = names(&["a", "b"]);
        let mut calls = 0;
        generate_with(&members, |receivers| {
            calls += 1;
            receivers.swap(0, 1);
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn same_seed_same_draw() {
        let members = names(&["a", "b", "c", "d", "e"]);
        let first = generate(&members, &mut ChaCha8Rng::seed_from_u64(42));
        let second = generate(&members, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_draw_is_a_derangement(
            list in prop::collection::hash_set("[a-z]{1,8}", 2..24),
            seed in any::<u64>(),
        ) {
            let members: Vec<Member> = list.into_iter().collect();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let pairings = generate(&members, &mut rng);

            prop_assert_eq!(pairings.len(), members.len());
            for (pairing, member) in pairings.iter().zip(&members) {
                prop_assert_eq!(&pairing.giver, member);
                prop_assert_ne!(&pairing.giver, &pairing.receiver);
            }
            let receivers: HashSet<_> = pairings.iter().map(|p| &p.receiver).collect();
            prop_assert_eq!(receivers.len(), members.len());
            prop_assert!(receivers.iter().all(|r| members.contains(r)));
        }
    }
}
