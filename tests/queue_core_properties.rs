use std::collections::HashMap;

use procqueue::ProcedureId;
use procqueue::queue::QueueCore;
use proptest::prelude::*;

fn scenario() -> impl Strategy<Value = (usize, Vec<usize>, Vec<usize>)> {
    (1usize..4, 1usize..16).prop_flat_map(|(limit, count)| {
        (
            Just(limit),
            Just((0..count).collect::<Vec<_>>()).prop_shuffle(),
            prop::collection::vec(any::<usize>(), count),
        )
    })
}

proptest! {
    /// Whatever order procedures become ready and finish in, the limit holds
    /// and every procedure starts exactly once.
    #[test]
    fn limit_holds_and_everything_starts_once((limit, ready_order, picks) in scenario()) {
        let count = ready_order.len();
        let ids: Vec<ProcedureId> = (0..count).map(|_| ProcedureId::new()).collect();
        let mut core = QueueCore::new(Some(limit));
        for (i, id) in ids.iter().enumerate() {
            prop_assert!(core.track(*id, i, None).is_some());
        }

        let mut starts: HashMap<usize, usize> = HashMap::new();
        let mut running: Vec<usize> = Vec::new();
        let mut record = |started: Vec<usize>, running: &mut Vec<usize>| {
            for item in started {
                *starts.entry(item).or_default() += 1;
                running.push(item);
            }
        };

        for &i in &ready_order {
            let started = core.mark_ready(ids[i]);
            record(started, &mut running);
            prop_assert!(core.executing_count() <= limit);
        }

        for pick in picks {
            if running.is_empty() {
                break;
            }
            let done = running.remove(pick % running.len());
            let started = core.detach(ids[done]);
            record(started, &mut running);
            prop_assert!(core.executing_count() <= limit);
            core.settle(ids[done]);
        }
        while let Some(done) = running.pop() {
            let started = core.detach(ids[done]);
            record(started, &mut running);
            prop_assert!(core.executing_count() <= limit);
            core.settle(ids[done]);
        }

        prop_assert_eq!(starts.len(), count);
        prop_assert!(starts.values().all(|&n| n == 1));
        prop_assert!(core.is_idle());
    }

    /// Waiting entries start in the order they became ready, whatever order
    /// they were submitted in.
    #[test]
    fn ready_entries_start_in_readiness_order(
        ready_order in (1usize..12).prop_flat_map(|count| {
            Just((0..count).collect::<Vec<_>>()).prop_shuffle()
        })
    ) {
        let blocker = ProcedureId::new();
        let mut core: QueueCore<usize> = QueueCore::new(Some(1));
        core.track(blocker, usize::MAX, None);

        let ids: Vec<ProcedureId> = ready_order.iter().map(|_| ProcedureId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            core.track(*id, i, None);
        }

        prop_assert_eq!(core.mark_ready(blocker), vec![usize::MAX]);
        for &i in &ready_order {
            prop_assert!(core.mark_ready(ids[i]).is_empty());
        }

        let mut order = core.detach(blocker);
        core.settle(blocker);
        let mut cursor = 0;
        while cursor < order.len() {
            let done = order[cursor];
            cursor += 1;
            order.extend(core.detach(ids[done]));
            core.settle(ids[done]);
        }

        prop_assert_eq!(order, ready_order);
        prop_assert!(core.is_idle());
    }
}
