use std::cell::Cell;
use std::rc::Rc;

use formula_scheme::{
    make_root_environment, make_root_environment_with_options, parse, Builtin, Environment,
    EvalOptions, Expr, SchemeError, Value,
};
use pretty_assertions::assert_eq;

fn eval_in(env: &Environment, text: &str) -> Result<Value, SchemeError> {
    env.evaluate(&parse(text).unwrap())
}

/// A builtin returning its argument and counting how often it ran.
fn counting_identity(calls: &Rc<Cell<usize>>) -> Value {
    let calls = Rc::clone(calls);
    Value::from(Builtin::new("count", move |args| {
        calls.set(calls.get() + 1);
        Ok(args.first().cloned().unwrap_or_else(Value::nil))
    }))
}

#[test]
fn definitions_are_lazy_and_memoized() {
    let host = make_root_environment();
    let calls = Rc::new(Cell::new(0));
    host.add("count", counting_identity(&calls));
    let root = host.child();

    // Out of order: `x` refers to `y` before `y` exists.
    root.define("x", parse("(+ (count y) 1)").unwrap());
    assert_eq!(calls.get(), 0);
    root.define("y", parse("5").unwrap());

    assert_eq!(eval_in(&root, "x").unwrap(), Value::from(6));
    assert_eq!(calls.get(), 1);
    assert_eq!(eval_in(&root, "x").unwrap(), Value::from(6));
    assert_eq!(calls.get(), 1, "second read must come from the cache");
}

#[test]
fn redefinition_invalidates_dependents() {
    let host = make_root_environment();
    let calls = Rc::new(Cell::new(0));
    host.add("count", counting_identity(&calls));
    let root = host.child();
    root.define("x", parse("(+ (count y) 1)").unwrap());
    root.define("y", parse("5").unwrap());
    assert_eq!(eval_in(&root, "x").unwrap(), Value::from(6));

    root.define("y", parse("10").unwrap());
    assert_eq!(eval_in(&root, "x").unwrap(), Value::from(11));
    assert_eq!(calls.get(), 2);
}

#[test]
fn invalidation_reaches_live_descendants() {
    let root = make_root_environment();
    root.define("base", parse("2").unwrap());
    let scenario = root.child();
    scenario.define("scaled", parse("base * 10").unwrap());
    let nested = scenario.child();

    assert_eq!(nested.lookup("scaled").unwrap(), Value::from(20));
    assert!(nested.has_local_value("scaled"));

    root.define("base", parse("3").unwrap());
    assert!(!nested.has_local_value("scaled"));
    assert_eq!(nested.lookup("scaled").unwrap(), Value::from(30));
}

#[test]
fn updated_parameters_invalidate_memoized_formulas() {
    let root = make_root_environment();
    root.define("area", parse("w * h").unwrap());
    root.update([("w", Value::from(2)), ("h", Value::from(3))]);
    assert_eq!(eval_in(&root, "area").unwrap(), Value::from(6));

    root.update([("w", Value::from(5))]);
    assert_eq!(eval_in(&root, "area").unwrap(), Value::from(15));
}

#[test]
fn parameters_held_by_an_ancestor_survive_redefinition() {
    let parameters = make_root_environment();
    parameters.update([("aPar", Value::from(3))]);
    let formulas = parameters.child();
    formulas.define("zFoo", parse("(+ aPar 7)").unwrap());
    assert_eq!(eval_in(&formulas, "zFoo").unwrap(), Value::from(10));

    formulas.define("zBar", parse("zFoo * 2").unwrap());
    assert_eq!(eval_in(&formulas, "zBar").unwrap(), Value::from(20));
}

#[test]
fn redefinition_clears_values_bound_beside_it() {
    let root = make_root_environment();
    root.update([("aPar", Value::from(3))]);
    root.define("zFoo", parse("(+ aPar 7)").unwrap());
    assert!(matches!(
        eval_in(&root, "zFoo"),
        Err(SchemeError::UnresolvedSymbol(name)) if name == "aPar"
    ));
}

#[test]
fn assigned_cache_entry_does_not_outlive_ancestor_redefinition() {
    let root = Environment::new();
    root.define("y", Expr::from(1));
    let child = root.child();
    assert_eq!(child.lookup("y").unwrap(), Value::from(1));
    child.assign("y", Value::from(5)).unwrap();

    root.define("y", Expr::from(10));
    assert_eq!(child.lookup("y").unwrap(), Value::from(10));
}

#[test]
fn top_level_evaluation_does_not_leak_bindings() {
    let root = make_root_environment();
    assert_eq!(eval_in(&root, "(begin (define tmp 4) tmp)").unwrap(), Value::from(4));
    assert!(!root.contains("tmp"));
    assert!(matches!(
        eval_in(&root, "tmp"),
        Err(SchemeError::UnresolvedSymbol(name)) if name == "tmp"
    ));
}

#[test]
fn closures_capture_the_defining_scope() {
    let defining = make_root_environment();
    defining.add("a", Value::from(1));
    let procedure = eval_in(&defining, "(lambda (x) (+ x a))").unwrap();

    let calling = make_root_environment();
    calling.add("a", Value::from(2));
    calling.add("f", procedure);
    assert_eq!(eval_in(&calling, "(f 10)").unwrap(), Value::from(11));
}

#[test]
fn lexical_scope_inside_one_program() {
    let root = make_root_environment();
    let result = eval_in(
        &root,
        "(begin
            (define a 1)
            (define get-a (lambda () a))
            ((lambda (a) (get-a)) 2))",
    )
    .unwrap();
    assert_eq!(result, Value::from(1));
}

#[test]
fn procedures_can_be_called_from_host_code() {
    let root = make_root_environment();
    let square = eval_in(&root, "(lambda (n) (* n n))").unwrap();
    assert_eq!(square.call(vec![Value::from(7)]).unwrap(), Value::from(49));
    assert!(matches!(
        square.call(vec![]),
        Err(SchemeError::Structural(_))
    ));
}

#[test]
fn recursive_definition_through_lazy_lookup() {
    let root = make_root_environment();
    root.define(
        "fact",
        parse("(lambda (n) (if (< n 2) 1 (* n (fact (- n 1)))))").unwrap(),
    );
    assert_eq!(eval_in(&root, "(fact 10)").unwrap(), Value::from(3_628_800));
}

#[test]
fn assignment_requires_an_existing_value_slot() {
    let root = Environment::new();
    root.define("z", Expr::from(5));
    let child = root.child();

    // `z` is only a definition nobody has read yet.
    assert_eq!(
        child.assign("z", Value::from(1)).unwrap_err(),
        SchemeError::InvalidAssignment("z".into())
    );

    assert_eq!(child.lookup("z").unwrap(), Value::from(5));
    child.assign("z", Value::from(2)).unwrap();
    assert_eq!(child.lookup("z").unwrap(), Value::from(2));
}

#[test]
fn assignment_never_targets_a_definition() {
    let root = Environment::new();
    root.define("z", Expr::from(5));
    assert_eq!(root.lookup("z").unwrap(), Value::from(5));
    // The memoized slot sits next to the definition in the same scope.
    assert!(matches!(
        root.assign("z", Value::from(1)),
        Err(SchemeError::InvalidAssignment(_))
    ));
}

#[test]
fn assignment_after_add_updates_nearest_slot() {
    let root = Environment::new();
    root.add("z", Value::from(1));
    let child = root.child();
    child.assign("z", Value::from(2)).unwrap();
    assert_eq!(root.lookup("z").unwrap(), Value::from(2));
    assert_eq!(child.lookup("z").unwrap(), Value::from(2));
}

#[test]
fn set_form_updates_the_owning_scope() {
    let root = make_root_environment();
    root.add("counter", Value::from(0));
    assert_eq!(
        eval_in(&root, "(begin (set! counter 5) counter)").unwrap(),
        Value::from(5)
    );
    assert_eq!(root.lookup("counter").unwrap(), Value::from(5));
    assert!(matches!(
        eval_in(&root, "(set! missing 1)"),
        Err(SchemeError::InvalidAssignment(_))
    ));
}

#[test]
fn membership_covers_every_resolution_step() {
    let root = Environment::new();
    root.define("defined", Expr::from(2));
    root.add("bound", Value::from(1));
    let child = root.child();
    assert!(child.contains("bound"));
    assert!(child.contains("defined"));
    assert!(!child.contains("other"));
    assert_eq!(root.definition("defined"), Some(Expr::from(2)));
}

#[test]
fn self_referential_definition_hits_depth_limit() {
    let root = make_root_environment_with_options(EvalOptions::default().with_max_depth(64));
    root.define("x", parse("x + 1").unwrap());
    assert_eq!(
        eval_in(&root, "x").unwrap_err(),
        SchemeError::DepthLimit { limit: 64 }
    );
    // The depth counter unwinds with the error.
    assert_eq!(eval_in(&root, "1 + 1").unwrap(), Value::from(2));
}

#[test]
fn runaway_recursion_is_bounded() {
    let root = make_root_environment_with_options(EvalOptions::default().with_max_depth(100));
    root.define("loop", parse("(lambda (n) (loop (+ n 1)))").unwrap());
    assert!(matches!(
        eval_in(&root, "(loop 0)"),
        Err(SchemeError::DepthLimit { limit: 100 })
    ));
}

#[test]
fn transient_scopes_are_released() {
    let root = make_root_environment();
    for i in 0..50 {
        eval_in(&root, &format!("{i} + 1")).unwrap();
    }
    assert_eq!(root.listener_count(), 0);
}

#[test]
fn locally_defined_procedures_release_their_scope() {
    let root = make_root_environment();
    for _ in 0..100 {
        assert_eq!(
            eval_in(&root, "(begin (define f (lambda (x) x)) (f 1))").unwrap(),
            Value::from(1)
        );
    }
    assert_eq!(root.listener_count(), 0);
}

#[test]
fn memoized_lambda_definition_releases_its_scratch_scope() {
    let root = make_root_environment();
    root.define("square", parse("(lambda (n) (* n n))").unwrap());
    assert_eq!(eval_in(&root, "(square 4)").unwrap(), Value::from(16));
    assert_eq!(eval_in(&root, "(square 5)").unwrap(), Value::from(25));
    assert_eq!(root.listener_count(), 0);
}

#[test]
fn local_procedures_stay_callable_after_escaping() {
    let root = make_root_environment();
    let double = eval_in(&root, "(begin (define f (lambda (x) (* x 2))) f)").unwrap();
    assert_eq!(double.call(vec![Value::from(21)]).unwrap(), Value::from(42));

    let add_five = eval_in(
        &root,
        "(begin
            (define make-adder (lambda (k) (begin (define add (lambda (x) (+ x k))) add)))
            (make-adder 5))",
    )
    .unwrap();
    assert_eq!(add_five.call(vec![Value::from(1)]).unwrap(), Value::from(6));
    drop(double);
    drop(add_five);
    assert_eq!(root.listener_count(), 0);
}

#[test]
fn local_procedure_is_identical_across_reads() {
    let root = make_root_environment();
    assert_eq!(
        eval_in(&root, "(begin (define f (lambda (x) x)) (eq? f f))").unwrap(),
        Value::from(true)
    );
}
