//! The binder: the public entry points of a binding call.

use core::any::{Any, TypeId};

use graft_node::Element;

use crate::builder::SchemaBuilder;
use crate::convert::{composite, Context};
use crate::error::{Error, Result};
use crate::registry::{global, RegistryArc, TypeRef};
use crate::strategy::{Strategy, TreeStrategy};

/// Reads and writes object graphs against a registry and a resolution
/// strategy.
///
/// A binder is cheap to construct and stateless across calls; every call
/// opens a fresh session and takes its own read lock on the registry.
///
/// # Examples
///
/// ```
/// use graft_core::{Binder, Registry, RegistryArc, SchemaBuilder};
///
/// #[derive(Default, PartialEq, Debug)]
/// struct Example {
///     name: String,
///     value: i32,
/// }
///
/// let mut registry = Registry::new();
/// registry
///     .register(
///         SchemaBuilder::<Example>::new("example")
///             .attribute("name", |e: &Example| Some(e.name.clone()), |e, v| e.name = v)
///             .element("value", |e: &Example| Some(e.value), |e, v| e.value = v),
///     )
///     .unwrap();
///
/// let binder = Binder::new().with_registry(RegistryArc::from(registry));
/// let example = Example { name: "x".into(), value: 7 };
///
/// let node = binder.write(&example).unwrap();
/// assert_eq!(
///     node.to_string(),
///     r#"<example name="x"><value>7</value></example>"#
/// );
/// assert_eq!(binder.read::<Example>(node).unwrap(), example);
/// ```
pub struct Binder {
    strategy: Box<dyn Strategy>,
    registry: RegistryArc,
}

impl Binder {
    /// A binder over the global registry with the default
    /// [`TreeStrategy`].
    pub fn new() -> Self {
        Self::with_strategy(TreeStrategy::new())
    }

    /// A binder over the global registry with a custom strategy.
    pub fn with_strategy(strategy: impl Strategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            registry: global().clone(),
        }
    }

    /// Rebinds this binder to another registry.
    pub fn with_registry(mut self, registry: RegistryArc) -> Self {
        self.registry = registry;
        self
    }

    /// The registry this binder resolves against.
    #[inline]
    pub fn registry(&self) -> &RegistryArc {
        &self.registry
    }

    /// Registers a composite type, a convenience over
    /// [`Registry::register`](crate::registry::Registry::register).
    pub fn register<T: 'static>(&self, builder: SchemaBuilder<T>) -> Result<()> {
        self.registry.write().register(builder)
    }

    /// Reads a document into a value of `T`.
    ///
    /// The root element's name is not validated against the schema; the
    /// caller already committed to a type by calling this.
    pub fn read<T: Any>(&self, root: Element) -> Result<T> {
        let value = self.read_dyn(TypeRef::of::<T>(), root)?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            Error::instantiation(
                core::any::type_name::<T>(),
                "resolved type is not assignable to the requested type",
            )
        })
    }

    /// Reads a document into an erased value of the declared type, or of
    /// whatever type the strategy resolves.
    pub fn read_dyn(&self, declared: TypeRef, root: Element) -> Result<Box<dyn Any>> {
        let registry = self.registry.read();
        let mut ctx = Context::new(&registry, self.strategy.as_ref());
        let mut root = root.into_root();
        composite::read(&mut ctx, &mut root, declared, true)
    }

    /// Writes a value as a document, rooted at the type's registered root
    /// name.
    pub fn write<T: Any>(&self, value: &T) -> Result<Element> {
        let name = {
            let registry = self.registry.read();
            match registry.root_name(TypeId::of::<T>()) {
                Some(name) => name.to_string(),
                None => TypeRef::of::<T>().short_name().to_lowercase(),
            }
        };
        let mut root = Element::new(name).into_root();
        self.write_into(&mut root, value)?;
        Ok(root)
    }

    /// Writes a value into an already named element.
    pub fn write_into<T: Any>(&self, node: &mut Element, value: &T) -> Result<()> {
        let registry = self.registry.read();
        let mut ctx = Context::new(&registry, self.strategy.as_ref());
        composite::write(&mut ctx, node, value, TypeRef::of::<T>(), true)
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use core::any::Any;
    use core::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use graft_node::Element;

    use super::Binder;
    use crate::builder::{ArrayField, ListField, MapField, SchemaBuilder};
    use crate::error::Error;
    use crate::ops::SharedAccess;
    use crate::registry::{Registry, RegistryArc, TypeRef};
    use crate::strategy::CycleStrategy;
    use crate::transform::Transform;

    #[derive(Default, PartialEq, Debug, Clone)]
    struct Example {
        name: String,
        value: i32,
    }

    fn example_binder() -> Binder {
        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Example>::new("example")
                    .attribute("name", |e: &Example| Some(e.name.clone()), |e, v| e.name = v)
                    .element("value", |e: &Example| Some(e.value), |e, v| e.value = v),
            )
            .unwrap();
        Binder::new().with_registry(RegistryArc::from(registry))
    }

    #[test]
    fn concrete_round_trip() {
        let binder = example_binder();
        let example = Example {
            name: "x".into(),
            value: 7,
        };
        let node = binder.write(&example).unwrap();
        assert_eq!(
            node.to_string(),
            r#"<example name="x"><value>7</value></example>"#
        );
        assert_eq!(binder.read::<Example>(node).unwrap(), example);
    }

    #[test]
    fn missing_required_element_fails_the_read() {
        let binder = example_binder();
        let node = Element::new("example").with_attribute("name", "x");
        let error = binder.read::<Example>(node).unwrap_err();
        assert!(matches!(error, Error::FieldRequired { name } if name == "value"));
    }

    #[test]
    fn strict_schemas_reject_unknown_content() {
        let binder = example_binder();
        let node = Element::new("example")
            .with_attribute("name", "x")
            .with_child(Element::new("value").with_value("7"))
            .with_child(Element::new("mystery"));
        let error = binder.read::<Example>(node).unwrap_err();
        assert!(matches!(error, Error::Element { name, .. } if name == "mystery"));
    }

    #[test]
    fn lenient_schemas_skip_unknown_content() {
        #[derive(Default, PartialEq, Debug)]
        struct Loose {
            value: i32,
        }

        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Loose>::new("loose")
                    .lenient()
                    .element("value", |l: &Loose| Some(l.value), |l, v| l.value = v),
            )
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let node = Element::new("loose")
            .with_attribute("mystery", "?")
            .with_child(Element::new("noise").with_child(Element::new("deep")))
            .with_child(Element::new("value").with_value("3"));
        assert_eq!(binder.read::<Loose>(node).unwrap(), Loose { value: 3 });
    }

    #[derive(Default, PartialEq, Debug, Clone)]
    struct Server {
        host: String,
    }

    fn server_schema() -> SchemaBuilder<Server> {
        SchemaBuilder::<Server>::new("server").attribute(
            "host",
            |s: &Server| Some(s.host.clone()),
            |s, v| s.host = v,
        )
    }

    #[test]
    fn inline_list_round_trip() {
        #[derive(Default, PartialEq, Debug)]
        struct Cluster {
            servers: Vec<Server>,
            label: String,
        }

        let mut registry = Registry::new();
        registry.register(server_schema()).unwrap();
        registry
            .register(
                SchemaBuilder::<Cluster>::new("cluster")
                    .list(
                        ListField::new("servers").inline(),
                        |c: &Cluster| Some(c.servers.clone()),
                        |c, v| c.servers = v,
                    )
                    .element("label", |c: &Cluster| Some(c.label.clone()), |c, v| {
                        c.label = v;
                    }),
            )
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let cluster = Cluster {
            servers: vec![
                Server { host: "a".into() },
                Server { host: "b".into() },
            ],
            label: "main".into(),
        };
        let node = binder.write(&cluster).unwrap();
        assert_eq!(
            node.to_string(),
            r#"<cluster><server host="a"/><server host="b"/><label>main</label></cluster>"#
        );
        assert_eq!(binder.read::<Cluster>(node).unwrap(), cluster);
    }

    #[test]
    fn union_run_faults_a_stray_sibling() {
        #[derive(Default, PartialEq, Debug)]
        struct Pool {
            servers: Vec<Server>,
        }

        let mut registry = Registry::new();
        registry.register(server_schema()).unwrap();
        registry
            .register(SchemaBuilder::<Pool>::new("pool").list(
                ListField::new("servers").union(),
                |p: &Pool| Some(p.servers.clone()),
                |p, v| p.servers = v,
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let node = Element::new("pool")
            .with_child(Element::new("server").with_attribute("host", "a"))
            .with_child(Element::new("imposter"));
        let error = binder.read::<Pool>(node).unwrap_err();
        assert!(
            matches!(error, Error::RootNameMismatch { expected, found, .. }
                if expected == "server" && found == "imposter")
        );
    }

    #[test]
    fn map_with_attribute_keys_round_trips() {
        #[derive(Default, PartialEq, Debug)]
        struct Config {
            settings: HashMap<String, String>,
        }

        let mut registry = Registry::new();
        registry
            .register(SchemaBuilder::<Config>::new("config").map(
                MapField::new("settings").attribute_keys(),
                |c: &Config| Some(c.settings.clone()),
                |c, v| c.settings = v,
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let mut config = Config::default();
        config.settings.insert("k".into(), "v".into());
        let node = binder.write(&config).unwrap();
        assert_eq!(
            node.to_string(),
            r#"<config><settings><entry key="k"><value>v</value></entry></settings></config>"#
        );
        assert_eq!(binder.read::<Config>(node).unwrap(), config);
    }

    #[test]
    fn inline_map_round_trips_without_a_wrapper() {
        #[derive(Default, PartialEq, Debug)]
        struct Constants {
            values: HashMap<String, f64>,
        }

        let mut registry = Registry::new();
        registry
            .register(SchemaBuilder::<Constants>::new("constants").map(
                MapField::new("values").attribute_keys().inline(),
                |c: &Constants| Some(c.values.clone()),
                |c, v| c.values = v,
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let mut constants = Constants::default();
        constants.values.insert("pi".into(), 3.5);
        let node = binder.write(&constants).unwrap();
        // Entries sit directly on the owning element.
        assert_eq!(
            node.to_string(),
            r#"<constants><entry key="pi"><value>3.5</value></entry></constants>"#
        );
        assert_eq!(binder.read::<Constants>(node).unwrap(), constants);
    }

    #[test]
    fn enumeration_binds_by_name() {
        #[derive(Clone, PartialEq, Debug, Default)]
        enum Mode {
            #[default]
            On,
            Off,
        }
        const MODES: &[(&str, Mode)] = &[("on", Mode::On), ("off", Mode::Off)];

        #[derive(Default, PartialEq, Debug)]
        struct Switch {
            mode: Mode,
        }

        let mut registry = Registry::new();
        registry.register_primitive::<Mode>(Transform::enumeration(MODES));
        registry
            .register(SchemaBuilder::<Switch>::new("switch").attribute(
                "mode",
                |s: &Switch| Some(s.mode.clone()),
                |s, v| s.mode = v,
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let node = binder.write(&Switch { mode: Mode::Off }).unwrap();
        assert_eq!(node.to_string(), r#"<switch mode="off"/>"#);
        assert_eq!(
            binder.read::<Switch>(node).unwrap(),
            Switch { mode: Mode::Off }
        );
    }

    #[test]
    fn hooks_run_in_lifecycle_order() {
        #[derive(Default, PartialEq, Debug, Clone)]
        struct Tracked {
            value: i32,
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let note = |log: &Arc<Mutex<Vec<&'static str>>>, entry: &'static str| {
            let log = Arc::clone(log);
            move || log.lock().unwrap().push(entry)
        };
        let (validate, commit, persist, complete) = (
            note(&log, "validate"),
            note(&log, "commit"),
            note(&log, "persist"),
            note(&log, "complete"),
        );

        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Tracked>::new("tracked")
                    .element("value", |t: &Tracked| Some(t.value), |t, v| t.value = v)
                    .on_validate(move |_| {
                        validate();
                        Ok(())
                    })
                    .on_commit(move |_| {
                        commit();
                        Ok(())
                    })
                    .on_persist(move |_| {
                        persist();
                        Ok(())
                    })
                    .on_complete(move |_| {
                        complete();
                        Ok(())
                    }),
            )
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let node = binder.write(&Tracked { value: 1 }).unwrap();
        binder.read::<Tracked>(node).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["persist", "complete", "validate", "commit"]
        );
    }

    #[test]
    fn complete_hook_runs_even_when_writing_fails() {
        #[derive(Default)]
        struct Flaky {
            value: Option<i32>,
        }

        let completed = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&completed);

        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Flaky>::new("flaky")
                    .element("value", |f: &Flaky| f.value, |f, v| f.value = Some(v))
                    .on_complete(move |_| {
                        *flag.lock().unwrap() = true;
                        Ok(())
                    }),
            )
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        // The required element reads null, so the write fails; the write
        // error wins, but completion still runs.
        let error = binder.write(&Flaky::default()).unwrap_err();
        assert!(matches!(error, Error::FieldRequired { name } if name == "value"));
        assert!(*completed.lock().unwrap(), "complete must run on failure");
    }

    #[test]
    fn resolve_hook_substitutes_the_read_value() {
        #[derive(Default, PartialEq, Debug)]
        struct Dedup {
            value: i32,
        }

        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Dedup>::new("dedup")
                    .element("value", |d: &Dedup| Some(d.value), |d, v| d.value = v)
                    .on_resolve(|read| Ok(Dedup { value: read.value * 2 })),
            )
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let node = Element::new("dedup").with_child(Element::new("value").with_value("21"));
        assert_eq!(binder.read::<Dedup>(node).unwrap(), Dedup { value: 42 });
    }

    trait Shape: Any {
        fn clone_erased(&self) -> Box<dyn Any>;
    }

    #[derive(Default, PartialEq, Debug, Clone)]
    struct Circle {
        radius: f64,
    }

    #[derive(Default, PartialEq, Debug, Clone)]
    struct Square {
        side: f64,
    }

    impl Shape for Circle {
        fn clone_erased(&self) -> Box<dyn Any> {
            Box::new(self.clone())
        }
    }

    impl Shape for Square {
        fn clone_erased(&self) -> Box<dyn Any> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn polymorphic_elements_annotate_and_resolve() {
        #[derive(Default)]
        struct Canvas {
            shape: Option<Box<dyn Shape>>,
        }

        let mut registry = Registry::new();
        registry
            .register(SchemaBuilder::<Circle>::new("circle").element(
                "radius",
                |c: &Circle| Some(c.radius),
                |c, v| c.radius = v,
            ))
            .unwrap();
        registry
            .register(SchemaBuilder::<Square>::new("square").element(
                "side",
                |s: &Square| Some(s.side),
                |s, v| s.side = v,
            ))
            .unwrap();
        registry
            .register(SchemaBuilder::<Canvas>::new("canvas").element_erased(
                "shape",
                TypeRef::of::<dyn Shape>(),
                |c: &Canvas| c.shape.as_ref().map(|shape| shape.clone_erased()),
                |c, value| {
                    let value = match value.downcast::<Circle>() {
                        Ok(circle) => {
                            c.shape = Some(circle);
                            return Ok(());
                        }
                        Err(value) => value,
                    };
                    match value.downcast::<Square>() {
                        Ok(square) => {
                            c.shape = Some(square);
                            Ok(())
                        }
                        Err(_) => Err(Error::Instantiation {
                            type_name: "Canvas::shape".into(),
                            reason: "resolved type is not a shape".into(),
                        }),
                    }
                },
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let canvas = Canvas {
            shape: Some(Box::new(Square { side: 2.0 })),
        };
        let node = binder.write(&canvas).unwrap();
        assert_eq!(
            node.to_string(),
            r#"<canvas><shape class="square"><side>2</side></shape></canvas>"#
        );

        let read = binder.read::<Canvas>(node).unwrap();
        let shape = read.shape.unwrap().clone_erased();
        assert_eq!(*shape.downcast::<Square>().unwrap(), Square { side: 2.0 });
    }

    #[test]
    fn erased_lists_collect_mixed_entries() {
        #[derive(Default)]
        struct Gallery {
            shapes: Vec<Box<dyn Shape>>,
        }

        fn reshape(value: Box<dyn Any>) -> Option<Box<dyn Shape>> {
            match value.downcast::<Circle>() {
                Ok(circle) => Some(circle),
                Err(value) => value.downcast::<Square>().ok().map(|s| s as Box<dyn Shape>),
            }
        }

        let mut registry = Registry::new();
        registry
            .register(SchemaBuilder::<Circle>::new("circle").element(
                "radius",
                |c: &Circle| Some(c.radius),
                |c, v| c.radius = v,
            ))
            .unwrap();
        registry
            .register(SchemaBuilder::<Square>::new("square").element(
                "side",
                |s: &Square| Some(s.side),
                |s, v| s.side = v,
            ))
            .unwrap();
        registry
            .register(SchemaBuilder::<Gallery>::new("gallery").list_erased(
                ListField::new("shapes").entry("shape"),
                TypeRef::of::<dyn Shape>(),
                |g: &Gallery| Some(g.shapes.iter().map(|s| s.clone_erased()).collect()),
                |g, values| g.shapes = values.into_iter().filter_map(reshape).collect(),
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let gallery = Gallery {
            shapes: vec![
                Box::new(Circle { radius: 1.0 }),
                Box::new(Square { side: 2.0 }),
            ],
        };
        let node = binder.write(&gallery).unwrap();
        assert_eq!(
            node.to_string(),
            concat!(
                r#"<gallery><shapes>"#,
                r#"<shape class="circle"><radius>1</radius></shape>"#,
                r#"<shape class="square"><side>2</side></shape>"#,
                r#"</shapes></gallery>"#
            )
        );

        let read = binder.read::<Gallery>(node).unwrap();
        assert_eq!(read.shapes.len(), 2);
        let first = read.shapes[0].clone_erased();
        assert_eq!(*first.downcast::<Circle>().unwrap(), Circle { radius: 1.0 });
        let second = read.shapes[1].clone_erased();
        assert_eq!(*second.downcast::<Square>().unwrap(), Square { side: 2.0 });
    }

    #[test]
    fn cyclic_handles_survive_a_round_trip() {
        #[derive(Default)]
        struct Node {
            value: i32,
            next: Option<Rc<RefCell<Node>>>,
        }
        type Handle = Rc<RefCell<Node>>;

        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Handle>::new("node")
                    .shared(SharedAccess::rc_refcell::<Node>())
                    .element(
                        "value",
                        |n: &Handle| Some(n.borrow().value),
                        |n, v| n.borrow_mut().value = v,
                    )
                    .optional_element(
                        "next",
                        |n: &Handle| n.borrow().next.clone(),
                        |n, v| n.borrow_mut().next = Some(v),
                    ),
            )
            .unwrap();
        let binder =
            Binder::with_strategy(CycleStrategy::new()).with_registry(RegistryArc::from(registry));

        // a -> b -> a
        let a: Handle = Rc::new(RefCell::new(Node {
            value: 1,
            next: None,
        }));
        let b: Handle = Rc::new(RefCell::new(Node {
            value: 2,
            next: Some(Rc::clone(&a)),
        }));
        a.borrow_mut().next = Some(Rc::clone(&b));

        let node = binder.write(&a).unwrap();
        assert_eq!(
            node.to_string(),
            concat!(
                r#"<node id="0"><value>1</value>"#,
                r#"<next id="1"><value>2</value><next ref="0"/></next></node>"#
            )
        );

        let read: Handle = binder.read::<Handle>(node).unwrap();
        assert_eq!(read.borrow().value, 1);
        let second = read.borrow().next.clone().unwrap();
        assert_eq!(second.borrow().value, 2);
        let third = second.borrow().next.clone().unwrap();
        assert!(Rc::ptr_eq(&read, &third), "the cycle closes on the root");
    }

    #[test]
    fn wire_order_override_applies_on_write() {
        #[derive(Default)]
        struct Pair {
            first: i32,
            second: i32,
        }

        let mut registry = Registry::new();
        registry
            .register(
                SchemaBuilder::<Pair>::new("pair")
                    .element("first", |p: &Pair| Some(p.first), |p, v| p.first = v)
                    .element("second", |p: &Pair| Some(p.second), |p, v| p.second = v)
                    .order(&[], &["second", "first"]),
            )
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let node = binder.write(&Pair { first: 1, second: 2 }).unwrap();
        assert_eq!(
            node.to_string(),
            r#"<pair><second>2</second><first>1</first></pair>"#
        );
    }

    #[test]
    fn arrays_carry_and_validate_their_length() {
        #[derive(Default, PartialEq, Debug)]
        struct Triple {
            values: Vec<i32>,
        }

        let mut registry = Registry::new();
        registry
            .register(SchemaBuilder::<Triple>::new("triple").array(
                ArrayField::new("values").entry("value").length(3),
                |t: &Triple| Some(t.values.clone()),
                |t, v| t.values = v,
            ))
            .unwrap();
        let binder = Binder::new().with_registry(RegistryArc::from(registry));

        let triple = Triple {
            values: vec![1, 2, 3],
        };
        let node = binder.write(&triple).unwrap();
        assert_eq!(
            node.to_string(),
            concat!(
                r#"<triple><values length="3">"#,
                r#"<value>1</value><value>2</value><value>3</value></values></triple>"#
            )
        );
        assert_eq!(binder.read::<Triple>(node).unwrap(), triple);

        let error = binder
            .write(&Triple { values: vec![1] })
            .unwrap_err();
        assert!(error.to_string().contains("length mismatch"));
    }

    #[test]
    fn registration_is_visible_across_threads() {
        let binder = Arc::new(example_binder());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let binder = Arc::clone(&binder);
                std::thread::spawn(move || {
                    let example = Example {
                        name: format!("t{i}"),
                        value: i,
                    };
                    let node = binder.write(&example).unwrap();
                    assert_eq!(binder.read::<Example>(node).unwrap(), example);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
