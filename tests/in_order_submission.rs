//! Submission protocol tests: in-order chaining, conformance edge
//! cases, hint resolution and concurrent submission.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use offload::{
    Device, DeviceId, Event, Queue, QueueProperties, Shape, SubmitProperties,
};

fn in_order_queue(device: Device) -> Queue {
    Queue::builder()
        .device(device)
        .properties(QueueProperties::new().with_in_order(true))
        .build()
        .unwrap()
}

/// Submission i on an in-order queue carries exactly one injected
/// dependency edge onto submission i-1; the first carries none.
#[test]
fn chain_has_one_edge_per_submission() {
    let queue = in_order_queue(Device::new(1));

    let events: Vec<Event> = (0..4)
        .map(|_| queue.single_task(|| Ok(())).unwrap())
        .collect();
    queue.wait();

    let nodes: Vec<_> = events
        .iter()
        .map(|evt| evt.node().expect("node behind event").clone())
        .collect();

    assert!(nodes[0].requirements().is_empty());
    for i in 1..nodes.len() {
        let reqs = nodes[i].requirements();
        assert_eq!(reqs.len(), 1, "submission {i} must have one dependency");
        assert!(Arc::ptr_eq(&reqs[0], &nodes[i - 1]));
    }
}

/// Out-of-order queues imply no ordering between submissions.
#[test]
fn out_of_order_submissions_are_independent() {
    let queue = Queue::new(Device::new(1));

    let first = queue.single_task(|| Ok(())).unwrap();
    let second = queue.single_task(|| Ok(())).unwrap();
    queue.wait();

    assert!(first.node().unwrap().requirements().is_empty());
    assert!(second.node().unwrap().requirements().is_empty());
}

/// A command group that registers nothing yields an empty event whose
/// wait is a no-op.
#[test]
fn empty_command_group_yields_empty_event() {
    let queue = Queue::new(Device::new(1));
    let event = queue.submit(|_cg| Ok(())).unwrap();
    assert!(event.node().is_none());
    assert!(event.is_complete());
    event.wait();
}

/// Multiple operations in one command group: everything runs, the
/// event wraps the last operation.
#[test]
fn multiple_operations_all_execute() {
    let queue = Queue::new(Device::new(1));
    let ran = Arc::new(AtomicUsize::new(0));

    let event = queue
        .submit(|cg| {
            let a = Arc::clone(&ran);
            cg.single_task(move || {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            let b = Arc::clone(&ran);
            cg.single_task(move || {
                b.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        })
        .unwrap();

    queue.wait();
    assert_eq!(ran.load(Ordering::SeqCst), 2);
    assert!(event.node().is_some());
    assert!(event.is_complete());
}

/// Retargeting overrides the device binding, even to a device outside
/// the queue's context (warned, not rejected).
#[test]
fn retarget_overrides_device_binding() {
    let queue = Queue::new(Device::new(1));

    let props = SubmitProperties::new().with_retarget(Device::new(2));
    let event = queue.submit_with(&props, |cg| {
        assert_eq!(cg.device(), Device::new(2));
        cg.single_task(|| Ok(()));
        Ok(())
    });
    let event = event.unwrap();
    queue.wait();

    assert_eq!(
        event.node().unwrap().execution_hints().device_binding(),
        Some(DeviceId::new(2))
    );
}

/// A preferred group size applies to kernels of the matching rank.
#[test]
fn preferred_group_size_lands_in_hints() {
    let queue = Queue::new(Device::new(1));

    let props = SubmitProperties::new().with_preferred_group_size(Shape::d2(8, 8));
    let event = queue
        .submit_with(&props, |cg| {
            cg.parallel_for(Shape::d2(16, 16), |_| Ok(()));
            Ok(())
        })
        .unwrap();
    queue.wait();

    assert_eq!(
        event.node().unwrap().execution_hints().preferred_group_size(),
        Some(Shape::d2(8, 8))
    );
}

/// A parallel-for runs its body once per work item.
#[test]
fn parallel_for_covers_every_item() {
    let queue = Queue::new(Device::new(1));
    let count = Arc::new(AtomicUsize::new(0));

    let body_count = Arc::clone(&count);
    let event = queue
        .parallel_for(Shape::d2(8, 8), move |_item| {
            body_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    event.wait();

    assert_eq!(count.load(Ordering::SeqCst), 64);
}

/// Dependent submissions see their dependency's effects.
#[test]
fn explicit_dependency_orders_execution() {
    let queue = Queue::new(Device::new(1));
    let trace = Arc::new(Mutex::new(Vec::new()));

    let first_trace = Arc::clone(&trace);
    let first = queue
        .single_task(move || {
            first_trace.lock().unwrap().push("first");
            Ok(())
        })
        .unwrap();

    let second_trace = Arc::clone(&trace);
    let second = queue
        .single_task_after(&first, move || {
            second_trace.lock().unwrap().push("second");
            Ok(())
        })
        .unwrap();
    second.wait();

    assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
}

/// Profiling timestamps are recorded when the queue enables profiling,
/// and absent otherwise.
#[test]
fn profiling_follows_queue_property() {
    let plain = Queue::new(Device::new(1));
    let event = plain.single_task(|| Ok(())).unwrap();
    event.wait();
    assert!(event.profiling().is_none());

    let profiled = Queue::builder()
        .device(Device::new(1))
        .properties(QueueProperties::new().with_profiling(true))
        .build()
        .unwrap();
    let event = profiled.single_task(|| Ok(())).unwrap();
    event.wait();

    let times = event.profiling().expect("profiling recorded");
    let started = times.started.expect("start recorded");
    let finished = times.finished.expect("finish recorded");
    assert!(times.submitted <= started);
    assert!(started <= finished);
}

/// Concurrent submissions to one in-order queue serialize on the queue
/// lock: the resulting dependency edges always form a single chain.
#[test]
fn concurrent_in_order_submissions_form_a_chain() {
    let queue = in_order_queue(Device::new(1));
    let events = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..4 {
                    let event = queue.single_task(|| Ok(())).unwrap();
                    events.lock().unwrap().push(event);
                }
            });
        }
    });
    queue.wait();

    let events = events.into_inner().unwrap();
    let nodes: Vec<_> = events
        .iter()
        .map(|evt| evt.node().unwrap().clone())
        .collect();
    assert_eq!(nodes.len(), 32);

    let mut roots = 0;
    let mut dep_ids = Vec::new();
    for node in &nodes {
        let reqs = node.requirements();
        match reqs.len() {
            0 => roots += 1,
            1 => dep_ids.push(reqs[0].id()),
            n => panic!("node with {n} injected dependencies"),
        }
    }
    assert_eq!(roots, 1, "exactly one submission starts the chain");
    dep_ids.sort_unstable();
    dep_ids.dedup();
    assert_eq!(dep_ids.len(), 31, "dependency targets must be distinct");
}
