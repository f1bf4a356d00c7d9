use ninos::harness::{Suite, TestStatus};
use ninos::{install, Callable, Lifecycle, NinosError, Object, Thrown};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn shared_object() -> (Object, Callable) {
    let method = Callable::new(|_, _| Ok(json!("r2")));
    (Object::new().with_method("method", method.clone()), method)
}

#[test]
fn spy_records_routed_and_direct_calls_and_can_delegate() {
    let (object, method) = shared_object();
    let suite_object = object.clone();
    let suite_method = method.clone();
    let mut suite = install(Suite::new(), Lifecycle::default());

    suite.test("spy", move |ctx| {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let s = ctx.spy_with(&suite_object, "method", move |original| {
            Callable::new(move |this, args| {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(json!("r1")),
                    2 => Ok(json!("r3")),
                    _ => match &original {
                        Some(original) => original.call(this, args),
                        None => Err(Thrown::msg("no original")),
                    },
                }
            })
        })?;

        assert_eq!(s.original(), Some(&suite_method));
        suite_object.call_with("method", Some(&json!("t1")), &[json!("a1")])?;
        s.call(Some(&json!("t2")), &[json!("a2")])?;
        suite_object.call_with("method", Some(&json!("t3")), &[json!("a3")])?;

        let returned: Vec<Value> = s
            .calls()
            .iter()
            .filter_map(|c| c.outcome.returned().cloned())
            .collect();
        assert_eq!(returned, vec![json!("r1"), json!("r2"), json!("r3")]);
        let receivers: Vec<Option<Value>> = s.calls().into_iter().map(|c| c.receiver).collect();
        assert_eq!(
            receivers,
            vec![Some(json!("t1")), Some(json!("t2")), Some(json!("t3"))]
        );
        Ok(())
    });

    let check_object = object.clone();
    let check_method = method.clone();
    suite.test("restored after test", move |_| {
        assert_eq!(check_object.method("method"), Some(check_method.clone()));
        Ok(())
    });

    let report = suite.run();
    assert!(report.all_passed(), "{report:?}");
    assert_eq!(object.method("method"), Some(method));
}

#[test]
fn throwing_spy_propagates_then_restores_original() {
    let obj = Object::new().with_method("m", Callable::new(|_, _| Ok(json!("orig"))));
    let seen: Arc<Mutex<Option<Thrown>>> = Arc::default();
    let mut suite = install(Suite::new(), Lifecycle::default());

    let target = obj.clone();
    let slot = Arc::clone(&seen);
    suite.test("throws", move |ctx| {
        let s = ctx.spy(
            &target,
            "m",
            Some(Callable::new(|_, _| Err(Thrown::msg("x")))),
        )?;
        let err = target.call("m", &[]).expect_err("spy throws");
        let recorded = s.log().get(0).expect("one record");
        assert!(recorded.outcome.threw().is_some_and(|e| e.same(&err)));
        *slot.lock().expect("slot lock") = Some(err);
        Ok(())
    });

    assert!(suite.run().all_passed());
    assert_eq!(obj.call("m", &[]).expect("restored"), json!("orig"));
    assert_eq!(
        seen.lock()
            .expect("slot lock")
            .as_ref()
            .map(ToString::to_string),
        Some("x".to_string())
    );
}

#[test]
fn failing_test_still_restores_and_reports_error() {
    let (obj, method) = shared_object();
    let mut suite = install(Suite::new(), Lifecycle::default());
    let target = obj.clone();
    suite.test("fails", move |ctx| {
        ctx.spy(&target, "method", Some(Callable::noop()))?;
        target.call("missing", &[])?;
        Ok(())
    });

    let report = suite.run();
    assert_eq!(
        report.status_of("fails"),
        Some(&TestStatus::Failed("`missing` is not a function".to_string()))
    );
    assert_eq!(obj.method("method"), Some(method));
}

#[test]
fn registries_do_not_leak_between_tests() {
    let (obj, method) = shared_object();
    let lifecycle = Lifecycle::default();
    let leaked: Arc<Mutex<Vec<usize>>> = Arc::default();
    let mut suite = install(Suite::new(), lifecycle);

    for title in ["a", "b", "c"] {
        let target = obj.clone();
        let sizes = Arc::clone(&leaked);
        suite.test(title, move |ctx| {
            let doubles = ctx.doubles()?;
            sizes
                .lock()
                .expect("sizes lock")
                .push(doubles.registry().len());
            doubles.spy(&target, "method", Some(Callable::noop()))?;
            doubles.spy(&target, "method", None)?;
            Ok(())
        });
    }

    assert!(suite.run().all_passed());
    assert_eq!(*leaked.lock().expect("sizes lock"), vec![0, 0, 0]);
    assert_eq!(obj.method("method"), Some(method));
}

#[test]
fn stale_doubles_refuse_new_spies() {
    let (obj, _) = shared_object();
    let stash: Arc<Mutex<Option<ninos::Doubles>>> = Arc::default();
    let mut suite = install(Suite::new(), Lifecycle::default());

    let keep = Arc::clone(&stash);
    suite.test("first", move |ctx| {
        *keep.lock().expect("stash lock") = Some(ctx.doubles()?.clone());
        Ok(())
    });
    assert!(suite.run().all_passed());

    let stale = stash
        .lock()
        .expect("stash lock")
        .clone()
        .expect("stashed doubles");
    let err = stale.spy(&obj, "method", None).expect_err("closed registry");
    assert!(matches!(err, NinosError::NoActiveRegistry));
}

#[test]
fn parallel_tests_get_isolated_registries() {
    let mut suite = install(Suite::new(), Lifecycle::default());
    let objects: Vec<(Object, Callable)> = (0..8).map(|_| shared_object()).collect();

    for (i, (obj, _)) in objects.iter().enumerate() {
        let target = obj.clone();
        suite.test(&format!("worker-{i}"), move |ctx| {
            let s = ctx.spy(&target, "method", Some(Callable::new(move |_, _| Ok(json!(i)))))?;
            for _ in 0..50 {
                assert_eq!(target.call("method", &[])?, json!(i));
            }
            assert_eq!(s.log().len(), 50);
            assert_eq!(ctx.doubles()?.registry().len(), 1);
            Ok(())
        });
    }

    let report = suite.run_parallel();
    assert_eq!(report.passed(), 8, "{report:?}");
    for (obj, method) in &objects {
        assert_eq!(obj.method("method"), Some(method.clone()));
    }
}
