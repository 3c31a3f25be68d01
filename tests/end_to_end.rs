//! End-to-end tests: components mounted on a `MemoryDocument` and driven
//! through the runtime's event loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_vdom::{
    Child, Component, ContextError, MemoryDocument, NodeId, Platform, Props, RenderError,
    Runtime, RuntimeConfig, StateSetter, create, h,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type SetterCell<T> = Rc<RefCell<Option<StateSetter<T>>>>;

fn setter_cell<T>() -> SetterCell<T> {
    Rc::new(RefCell::new(None))
}

fn set<T: PartialEq + 'static>(cell: &SetterCell<T>, value: T) {
    if let Some(setter) = cell.borrow().as_ref() {
        setter.set(value);
    }
}

fn markup(runtime: &Runtime<MemoryDocument>, node: NodeId) -> String {
    runtime.with_platform(|doc| doc.to_markup(node))
}

fn children(runtime: &Runtime<MemoryDocument>, node: NodeId) -> Vec<NodeId> {
    runtime.with_platform(|doc| doc.children(node))
}

// =============================================================================
// Minimal mutation
// =============================================================================

#[test]
fn test_text_change_keeps_elements() {
    init_tracing();
    let runtime = Runtime::new(MemoryDocument::new());
    let text = setter_cell::<String>();

    let t = text.clone();
    let app = Component::named("App", move |cx| {
        let (value, set_value) = cx.use_state("1".to_string())?;
        *t.borrow_mut() = Some(set_value);
        Ok(h!("div", h!("p", value)))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><div><p>1</p></div></body>");

    let div = runtime.live_root(root).unwrap();
    let p = children(&runtime, div)[0];
    let mutations = runtime.with_platform(|doc| doc.mutation_count());

    set(&text, "2".to_string());
    runtime.run_until_idle();

    assert_eq!(markup(&runtime, root), "<body><div><p>2</p></div></body>");
    assert_eq!(runtime.live_root(root), Some(div));
    assert_eq!(children(&runtime, div), vec![p]);
    // One text node created, one swapped in.
    assert_eq!(runtime.with_platform(|doc| doc.mutation_count()) - mutations, 2);
    assert_eq!(runtime.commit_count(root), Some(2));
}

#[test]
fn test_replaced_nodes_are_released() {
    let runtime = Runtime::new(MemoryDocument::new());
    let count = setter_cell::<u32>();

    let c = count.clone();
    let app = Component::new(move |cx| {
        let (n, set_n) = cx.use_state(0u32)?;
        *c.borrow_mut() = Some(set_n);
        Ok(h!("div", h!("p", n.to_string())))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    let nodes = runtime.with_platform(|doc| doc.node_count());

    for n in 1..=20 {
        set(&count, n);
        runtime.run_until_idle();
    }
    assert_eq!(markup(&runtime, root), "<body><div><p>20</p></div></body>");
    assert_eq!(runtime.with_platform(|doc| doc.node_count()), nodes);
}

#[test]
fn test_moved_keyed_children_are_recreated() {
    let runtime = Runtime::new(MemoryDocument::new());
    let items = setter_cell::<Vec<&'static str>>();

    let i = items.clone();
    let list = Component::new(move |cx| {
        let (items, set_items) = cx.use_state(vec!["a", "b", "c"])?;
        *i.borrow_mut() = Some(set_items);
        Ok(create(
            "ul",
            items
                .iter()
                .map(|item| Child::from(h!("li", Props::new().key(*item), *item))),
        ))
    });

    let root = runtime.mount(&list, None).unwrap();
    runtime.run_until_idle();
    let ul = runtime.live_root(root).unwrap();
    let before = children(&runtime, ul);

    set(&items, vec!["b", "a", "c"]);
    runtime.run_until_idle();

    let after = children(&runtime, ul);
    assert_eq!(markup(&runtime, ul), "<ul><li>b</li><li>a</li><li>c</li></ul>");
    assert_ne!(after[0], before[1]);
    assert_ne!(after[1], before[0]);
    assert_eq!(after[2], before[2]);
}

// =============================================================================
// Batching
// =============================================================================

#[test]
fn test_two_setters_one_commit() {
    let runtime = Runtime::new(MemoryDocument::new());
    let renders = Rc::new(Cell::new(0));
    let first = setter_cell::<i32>();
    let second = setter_cell::<i32>();

    let (r, f, s) = (renders.clone(), first.clone(), second.clone());
    let app = Component::new(move |cx| {
        r.set(r.get() + 1);
        let (a, set_a) = cx.use_state(0)?;
        let (b, set_b) = cx.use_state(0)?;
        *f.borrow_mut() = Some(set_a);
        *s.borrow_mut() = Some(set_b);
        Ok(h!("p", format!("{a}+{b}")))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(renders.get(), 1);

    set(&first, 1);
    set(&second, 2);
    runtime.run_until_idle();

    assert_eq!(renders.get(), 2);
    assert_eq!(runtime.commit_count(root), Some(2));
    assert_eq!(markup(&runtime, root), "<body><p>1+2</p></body>");
}

#[test]
fn test_setter_with_current_value_schedules_nothing() {
    let runtime = Runtime::new(MemoryDocument::new());
    let value = setter_cell::<i32>();

    let v = value.clone();
    let app = Component::new(move |cx| {
        let (n, set_n) = cx.use_state(7)?;
        *v.borrow_mut() = Some(set_n);
        Ok(h!("p", n.to_string()))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();

    let scheduled = value.borrow().as_ref().map(|s| s.try_set(7));
    assert_eq!(scheduled, Some(Ok(false)));
    assert!(runtime.scheduler().is_idle());
    assert_eq!(runtime.run_until_idle(), 0);
    assert_eq!(runtime.commit_count(root), Some(1));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_replacing_component_tears_down_state() {
    let runtime = Runtime::new(MemoryDocument::new());
    let old_setter = setter_cell::<i32>();

    let s = old_setter.clone();
    let first = Component::named("First", move |cx| {
        let (n, set_n) = cx.use_state(0)?;
        *s.borrow_mut() = Some(set_n);
        Ok(h!("p", n.to_string()))
    });
    let second = Component::named("Second", |_| Ok(h!("section", "second")));

    let root = runtime.mount(&first, None).unwrap();
    runtime.run_until_idle();
    let first_id = runtime.instance_id(root).unwrap();

    runtime.mount(&second, Some(root)).unwrap();
    runtime.run_until_idle();

    assert_ne!(runtime.instance_id(root), Some(first_id.clone()));
    assert_eq!(markup(&runtime, root), "<body><section>second</section></body>");

    let attempt = old_setter.borrow().as_ref().map(|s| s.try_set(5));
    assert_eq!(attempt, Some(Err(ContextError::Detached)));

    let declared = runtime
        .hooks()
        .declare_state(&first_id, runtime.scheduler(), 0);
    assert_eq!(
        declared.err(),
        Some(ContextError::NotRendering {
            instance: Some(first_id.clone())
        })
    );
    assert!(!runtime.hooks().has_instance(&first_id));
    assert!(runtime.scheduler().is_idle());
}

#[test]
fn test_replacement_without_clearing_removes_old_tree() {
    let config = RuntimeConfig::default().with_clear_container_on_first_render(false);
    let runtime = Runtime::with_config(MemoryDocument::new(), config);
    let a = Component::named("A", |_| {
        Ok(h!("button", Props::new().on("click", |_| {}), "A"))
    });
    let b = Component::named("B", |_| Ok(h!("p", "B")));

    let root = runtime.mount(&a, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><button>A</button></body>");

    runtime.mount(&b, Some(root)).unwrap();
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><p>B</p></body>");
    assert_eq!(runtime.listener_count(), 0);
}

#[test]
fn test_unmount_then_remount() {
    let runtime = Runtime::new(MemoryDocument::new());
    let container = runtime.with_platform_mut(|doc| doc.create_container("main").unwrap());
    let app = Component::new(|cx| {
        let (n, _) = cx.use_state(1)?;
        Ok(h!("p", n.to_string()))
    });

    runtime.mount(&app, Some(container)).unwrap();
    runtime.run_until_idle();
    let id = runtime.instance_id(container).unwrap();

    assert_eq!(runtime.unmount(container), Ok(true));
    assert_eq!(markup(&runtime, container), "<main></main>");
    assert!(!runtime.hooks().has_instance(&id));

    runtime.mount(&app, Some(container)).unwrap();
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, container), "<main><p>1</p></main>");
    assert_ne!(runtime.instance_id(container), Some(id));
}

#[test]
fn test_containers_are_independent() {
    let runtime = Runtime::new(MemoryDocument::new());
    let (left, right) = runtime.with_platform_mut(|doc| {
        (
            doc.create_container("aside").unwrap(),
            doc.create_container("main").unwrap(),
        )
    });
    let left_setter = setter_cell::<i32>();

    let s = left_setter.clone();
    let counter = Component::new(move |cx| {
        let (n, set_n) = cx.use_state(0)?;
        *s.borrow_mut() = Some(set_n);
        Ok(h!("p", n.to_string()))
    });
    let label = Component::new(|_| Ok(h!("p", "static")));

    runtime.mount(&counter, Some(left)).unwrap();
    runtime.mount(&label, Some(right)).unwrap();
    runtime.run_until_idle();

    set(&left_setter, 3);
    runtime.run_until_idle();

    assert_eq!(runtime.commit_count(left), Some(2));
    assert_eq!(runtime.commit_count(right), Some(1));
    assert_eq!(
        markup(&runtime, runtime.with_platform(|doc| doc.root())),
        "<body><aside><p>3</p></aside><main><p>static</p></main></body>"
    );
}

// =============================================================================
// Guards and failures
// =============================================================================

#[test]
fn test_runaway_render_is_capped() {
    init_tracing();
    let runtime = Runtime::new(MemoryDocument::new());
    let app = Component::new(|cx| {
        let (n, set_n) = cx.use_state(0u32)?;
        set_n.set(n + 1);
        Ok(h!("p", n.to_string()))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();

    assert_eq!(runtime.commit_count(root), Some(11));
    assert_eq!(markup(&runtime, root), "<body><p>10</p></body>");
    assert!(runtime.scheduler().is_idle());
}

#[test]
fn test_burst_cap_is_configurable() {
    let config = RuntimeConfig::default().with_render_burst_cap(2);
    let runtime = Runtime::with_config(MemoryDocument::new(), config);
    let app = Component::new(|cx| {
        let (n, set_n) = cx.use_state(0u32)?;
        set_n.set(n + 1);
        Ok(h!("p", n.to_string()))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(runtime.commit_count(root), Some(3));
}

#[test]
fn test_render_error_keeps_previous_tree() {
    init_tracing();
    let runtime = Runtime::new(MemoryDocument::new());
    let fail = setter_cell::<bool>();
    let label = setter_cell::<String>();

    let (f, l) = (fail.clone(), label.clone());
    let app = Component::new(move |cx| {
        let (failing, set_failing) = cx.use_state(false)?;
        let (text, set_text) = cx.use_state("before".to_string())?;
        *f.borrow_mut() = Some(set_failing);
        *l.borrow_mut() = Some(set_text);
        if failing {
            return Err(RenderError::msg("render exploded"));
        }
        Ok(h!("p", text))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    let tree = runtime.last_tree(root);

    set(&fail, true);
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><p>before</p></body>");
    assert_eq!(runtime.last_tree(root), tree);
    assert_eq!(runtime.commit_count(root), Some(1));

    set(&fail, false);
    set(&label, "after".to_string());
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><p>after</p></body>");
    assert_eq!(runtime.commit_count(root), Some(2));
}

#[test]
fn test_refused_tag_keeps_previous_tree() {
    init_tracing();
    let runtime = Runtime::new(MemoryDocument::new());
    let broken = setter_cell::<bool>();

    let b = broken.clone();
    let app = Component::new(move |cx| {
        let (broken, set_broken) = cx.use_state(false)?;
        *b.borrow_mut() = Some(set_broken);
        if broken {
            Ok(h!("div", h!("p", "a"), h!("no tag")))
        } else {
            Ok(h!("div", h!("p", "a")))
        }
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    let live = runtime.live_root(root);
    let tree = runtime.last_tree(root);

    set(&broken, true);
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><div><p>a</p></div></body>");
    assert_eq!(runtime.live_root(root), live);
    assert_eq!(runtime.last_tree(root), tree);
    assert_eq!(runtime.commit_count(root), Some(1));

    set(&broken, false);
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), "<body><div><p>a</p></div></body>");
    assert_eq!(runtime.commit_count(root), Some(2));
}

#[test]
fn test_refused_tag_on_first_render_tracks_no_listeners() {
    let runtime = Runtime::new(MemoryDocument::new());
    let app = Component::new(|_| {
        Ok(h!("div", Props::new().on("click", |_| {}), h!("no tag")))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(runtime.listener_count(), 0);
    assert_eq!(markup(&runtime, root), "<body></body>");
    assert_eq!(runtime.commit_count(root), Some(0));
}

#[test]
fn test_invalid_attribute_is_not_fatal() {
    let runtime = Runtime::new(MemoryDocument::new());
    let app = Component::new(|_| {
        Ok(h!("div",
            Props::new().attr("bad attr", 1).attr("id", "ok").style("bad prop!", "x"),
            "content",
        ))
    });

    let root = runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(markup(&runtime, root), r#"<body><div id="ok">content</div></body>"#);
    assert_eq!(runtime.commit_count(root), Some(1));
}

// =============================================================================
// Events and effects
// =============================================================================

#[test]
fn test_click_handler_updates_state() {
    let runtime = Runtime::new(MemoryDocument::new());
    let counter = Component::named("Counter", |cx| {
        let (count, set_count) = cx.use_state(0)?;
        Ok(h!("button",
            Props::new().on("click", move |_| set_count.set(count + 1)),
            count.to_string(),
        ))
    });

    let root = runtime.mount(&counter, None).unwrap();
    runtime.run_until_idle();
    let button = runtime.live_root(root).unwrap();

    for expected in ["1", "2", "3"] {
        assert_eq!(runtime.dispatch_event(button, "click"), 1);
        runtime.run_until_idle();
        assert_eq!(runtime.with_platform(|doc| doc.text_content(button)), expected);
    }

    assert_eq!(runtime.live_root(root), Some(button));
    assert_eq!(runtime.with_platform(|doc| doc.listener_count(button)), 1);
    assert_eq!(runtime.listener_count(), 1);
}

#[test]
fn test_effects_run_every_commit() {
    let runtime = Runtime::new(MemoryDocument::new());
    let runs = Rc::new(Cell::new(0));
    let value = setter_cell::<i32>();

    let (r, v) = (runs.clone(), value.clone());
    let app = Component::new(move |cx| {
        let (n, set_n) = cx.use_state(0)?;
        *v.borrow_mut() = Some(set_n);
        let r = r.clone();
        // The dependency list never changes; the effect still runs.
        cx.use_effect(move || r.set(r.get() + 1), [0]);
        Ok(h!("p", n.to_string()))
    });

    runtime.mount(&app, None).unwrap();
    runtime.run_until_idle();
    assert_eq!(runs.get(), 1);

    set(&value, 1);
    runtime.run_until_idle();
    set(&value, 2);
    runtime.run_until_idle();
    assert_eq!(runs.get(), 3);
}
