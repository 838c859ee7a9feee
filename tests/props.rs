use std::cell::Cell;
use std::rc::Rc;

use deep_xform::{
    deep_clone, deep_freeze, synthesize, ApplyOptions, ClassRef, CustomType, Mode, Recipe, RecordType,
    Shape, SynthConfig, Synthesizer, Value,
};
use proptest::prelude::*;
use serde_json::json;

// ------------------------------ Fixtures --------------------------------- //

fn point_type(class: &ClassRef) -> RecordType {
    let class = class.clone();
    RecordType::new("Point")
        .with_serialize(|v, _strict| {
            let r = v.as_record().ok_or_else(|| anyhow::anyhow!("not a record"))?;
            let r = r.borrow();
            Ok(Value::map(r.fields.iter().map(|(k, v)| (Value::str(k.as_str()), v.clone()))))
        })
        .with_from_repr(move |repr| {
            let m = repr.as_map().ok_or_else(|| anyhow::anyhow!("expected map"))?;
            let m = m.borrow();
            let field = |name: &str| m.get(&Value::str(name)).cloned().unwrap_or(Value::Nil);
            Ok(Value::record(&class, [("x", field("x")), ("label", field("label"))]))
        })
}

fn plain_data() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z]{0,6}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

fn all_frozen(v: &Value) -> bool {
    if !v.is_frozen() {
        return false;
    }
    match v {
        Value::Seq(xs) => xs.borrow().iter().all(all_frozen),
        Value::Map(m) => m.borrow().iter().all(|(k, v)| all_frozen(k) && all_frozen(v)),
        _ => true,
    }
}

// ------------------------------ Traversal -------------------------------- //

#[test]
fn end_to_end_clone_then_freeze() {
    let input = Value::from_json(&json!({"a": [1, 2, 3], "b": {"c": "x"}}));
    let copy = deep_clone(&input, false);

    assert_eq!(copy, input);
    assert!(!copy.same(&input));
    {
        let (im, cm) = (input.as_map().unwrap().borrow(), copy.as_map().unwrap().borrow());
        assert!(!im[&Value::str("a")].same(&cm[&Value::str("a")]));
        assert!(!im[&Value::str("b")].same(&cm[&Value::str("b")]));
    }

    deep_freeze(&copy);
    assert!(all_frozen(&copy));
    assert!(!input.is_frozen());
    let cm = copy.as_map().unwrap().borrow();
    assert_eq!(cm[&Value::str("a")], Value::from_json(&json!([1, 2, 3])));
}

#[test]
fn self_reference_survives_freezing() {
    let a = Value::map([]);
    a.insert(Value::str("me"), a.clone()).unwrap();
    deep_freeze(&a);
    assert!(a.is_frozen());
    assert!(a.as_map().unwrap().borrow()[&Value::str("me")].same(&a));
    assert!(a.insert(Value::str("other"), Value::Nil).is_err());
}

proptest! {
    #[test]
    fn clone_is_equal_and_distinct(doc in plain_data()) {
        let v = Value::from_json(&doc);
        let c = deep_clone(&v, false);
        prop_assert_eq!(&c, &v);
        if v.identity().is_some() {
            prop_assert!(!c.same(&v));
        } else {
            prop_assert!(c.same(&v));
        }
        prop_assert_eq!(c.to_json().unwrap(), doc);
    }

    #[test]
    fn freezing_twice_is_freezing_once(doc in plain_data()) {
        let v = Value::from_json(&doc);
        deep_freeze(&v);
        let once = v.to_json().unwrap();
        deep_freeze(&v);
        prop_assert!(all_frozen(&v));
        prop_assert_eq!(v.to_json().unwrap(), once);
    }

    #[test]
    fn clone_with_freeze_leaves_source_alone(doc in plain_data()) {
        let v = Value::from_json(&doc);
        let c = deep_clone(&v, true);
        prop_assert!(all_frozen(&c));
        if let Value::Seq(_) | Value::Map(_) = v {
            prop_assert!(!v.is_frozen());
        }
    }
}

// ------------------------------ Recipes ---------------------------------- //

#[test]
fn string_sequence_modes() {
    let shape = Shape::seq(Shape::string());
    let opts = ApplyOptions::default();

    for mode in [Mode::Serialize, Mode::DeserializeIntoMutable] {
        let input = Value::from_json(&json!(["a", "b"]));
        let out = synthesize(&shape, mode).apply(&input, &opts).unwrap();
        assert_eq!(out, input);
        assert!(!out.same(&input));
        assert!(!input.as_seq().unwrap().borrow()[0].is_frozen());
    }

    let input = Value::from_json(&json!(["a", "b"]));
    let recipe = synthesize(&shape, Mode::DeserializeIntoFrozen);
    assert!(!recipe.allocates());
    let out = recipe.apply(&input, &opts).unwrap();
    assert!(out.same(&input));
    assert!(all_frozen(&input));
}

#[test]
fn record_values_round_trip_through_recipes() {
    let class = ClassRef::new("Point");
    let point = Rc::new(point_type(&class));
    let shape = Shape::map(Shape::numeric(), Shape::record(&point));
    let opts = ApplyOptions::default();

    let repr = Value::map([(Value::Int(7), Value::from_json(&json!({"x": 1, "label": "p"})))]);
    let live = synthesize(&shape, Mode::DeserializeIntoMutable).apply(&repr, &opts).unwrap();
    {
        let (rm, lm) = (repr.as_map().unwrap().borrow(), live.as_map().unwrap().borrow());
        assert!(rm.keys().zip(lm.keys()).all(|(a, b)| a.same(b)));
        assert!(lm[&Value::Int(7)].as_record().is_some());
        assert!(!live.is_frozen());
    }

    let back = synthesize(&shape, Mode::Serialize).apply(&live, &opts).unwrap();
    // integer keys untouched, record values flattened back to maps
    assert_eq!(back, repr);
    assert!(back.as_map().unwrap().borrow()[&Value::Int(7)].is_scalar());

    let frozen = synthesize(&shape, Mode::DeserializeIntoFrozen).apply(&repr, &opts).unwrap();
    assert!(frozen.is_frozen());
    let fm = frozen.as_map().unwrap().borrow();
    let rec = &fm[&Value::Int(7)];
    assert!(rec.is_frozen());
    assert!(rec.as_record().unwrap().borrow().fields["label"].is_frozen());
    assert!(rec.set_field("x", Value::Int(2)).is_err());
}

#[test]
fn key_only_map_transforms_rebuild_keys_and_keep_values() {
    let shape = Shape::map(Shape::Unknown, Shape::numeric());
    let recipe = synthesize(&shape, Mode::Serialize);
    assert!(matches!(recipe, Recipe::TransformKeys { .. }));

    let key = Value::seq(vec![Value::str("k")]);
    let input = Value::map([(key.clone(), Value::Int(1)), (Value::str("s"), Value::float(2.5))]);
    let out = recipe.apply(&input, &ApplyOptions::default()).unwrap();

    assert_eq!(out, input);
    assert!(!out.same(&input));
    assert!(!out.is_frozen());
    let (im, om) = (input.as_map().unwrap().borrow(), out.as_map().unwrap().borrow());
    for ((ik, iv), (ok, ov)) in im.iter().zip(om.iter()) {
        assert_eq!(ik, ok);
        assert!(!ik.same(ok));
        assert!(iv.same(ov));
    }
    assert!(om.contains_key(&key));
}

#[test]
fn record_serializers_see_the_strict_flag_through_rebuilt_maps() {
    let seen = Rc::new(Cell::new(None));
    let class = ClassRef::new("Item");
    let item = Rc::new(RecordType::new("Item").with_serialize({
        let seen = Rc::clone(&seen);
        move |v: &Value, strict: bool| {
            seen.set(Some(strict));
            let r = v.as_record().ok_or_else(|| anyhow::anyhow!("not a record"))?;
            let r = r.borrow();
            Ok(Value::map(r.fields.iter().map(|(k, v)| (Value::str(k.as_str()), v.clone()))))
        }
    }));
    let recipe = synthesize(&Shape::map(Shape::Unknown, Shape::record(&item)), Mode::Serialize);
    assert!(matches!(recipe, Recipe::RebuildMap { .. }));

    let key = Value::str("k");
    let rec = Value::record(&class, [("n", Value::Int(1))]);
    let input = Value::map([(key.clone(), rec.clone())]);

    for strict in [true, false] {
        let out = recipe.apply(&input, &ApplyOptions { strict, ..Default::default() }).unwrap();
        assert_eq!(seen.get(), Some(strict));
        assert_eq!(out.to_json().unwrap(), json!({"k": {"n": 1}}));

        let om = out.as_map().unwrap().borrow();
        let (ok, ov) = om.get_index(0).unwrap();
        assert!(!ok.same(&key));
        assert!(!ov.same(&rec));
        assert!(ov.as_map().is_some());
    }
}

#[test]
fn frozen_string_maps_are_frozen_pairwise_in_place() {
    let recipe = synthesize(&Shape::map(Shape::string(), Shape::string()), Mode::DeserializeIntoFrozen);
    assert!(matches!(recipe, Recipe::EachPairInPlace { .. }));
    assert!(!recipe.allocates());

    let (key, value) = (Value::str("k"), Value::str("v"));
    let input = Value::map([(key.clone(), value.clone())]);
    let out = recipe.apply(&input, &ApplyOptions::default()).unwrap();

    assert!(out.same(&input));
    assert!(input.is_frozen());
    assert!(key.is_frozen());
    assert!(value.is_frozen());
    assert!(input.insert(Value::str("x"), Value::Nil).is_err());
}

#[test]
fn option_aware_constructors_build_frozen_records_themselves() {
    let class = ClassRef::new("Tag");
    let tag = Rc::new(RecordType::new("Tag").with_from_repr_opts(move |repr, opts| {
        let rec = Value::record(&class, [("name", repr.clone())]);
        if opts.freeze {
            rec.freeze();
        }
        Ok(rec)
    }));
    let recipe = synthesize(&Shape::record(&tag), Mode::DeserializeIntoFrozen);
    let name = Value::str("t");
    let out = recipe.apply(&name, &ApplyOptions::default()).unwrap();
    assert!(out.is_frozen());
    // the constructor froze only itself; nothing deep-froze the field
    assert!(!name.is_frozen());
}

#[test]
fn custom_scalars_use_their_hooks() {
    let cents = Rc::new(
        CustomType::new("Cents")
            .with_serialize(|v| match v {
                Value::Str(s) => Ok(Value::Int(s.borrow().trim_end_matches('c').parse()?)),
                _ => anyhow::bail!("not cents"),
            })
            .with_deserialize(|repr| match repr {
                Value::Int(i) => Ok(Value::str(format!("{i}c"))),
                _ => anyhow::bail!("not an int"),
            }),
    );
    let shape = Shape::seq(Shape::custom(&cents));
    let opts = ApplyOptions::default();

    let repr = Value::from_json(&json!([1, 25]));
    let live = synthesize(&shape, Mode::DeserializeIntoFrozen).apply(&repr, &opts).unwrap();
    assert_eq!(live, Value::seq(vec![Value::str("1c"), Value::str("25c")]));
    assert!(all_frozen(&live));

    let back = synthesize(&shape, Mode::Serialize).apply(&live, &opts).unwrap();
    assert_eq!(back.to_json().unwrap(), json!([1, 25]));

    let err = synthesize(&shape, Mode::Serialize).apply(&repr, &opts).unwrap_err();
    assert!(err.to_string().contains("not cents"));
}

#[test]
fn missing_hooks_fail_only_when_applied() {
    let bare = Rc::new(RecordType::new("Bare"));
    let recipe = synthesize(&Shape::optional(Shape::record(&bare)), Mode::DeserializeIntoMutable);
    assert!(recipe.apply(&Value::Nil, &ApplyOptions::default()).unwrap().is_nil());
    let err = recipe.apply(&Value::map([]), &ApplyOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "`Bare` has no `from_repr` hook");
}

#[test]
fn unknown_shapes_fall_back_to_traversal() {
    let input = Value::from_json(&json!({"k": ["v"]}));
    let opts = ApplyOptions::default();

    let cloned = synthesize(&Shape::Unknown, Mode::Serialize).apply(&input, &opts).unwrap();
    assert_eq!(cloned, input);
    assert!(!cloned.same(&input));

    let frozen = synthesize(&Shape::Unknown, Mode::DeserializeIntoFrozen).apply(&input, &opts).unwrap();
    assert!(frozen.same(&input));
    assert!(all_frozen(&input));
}

#[test]
fn configured_scalar_names_skip_transforms() {
    let cfg = SynthConfig::from_json_str(r#"{"scalar_types": ["Boolean"]}"#).unwrap();
    let synth = Synthesizer::new(cfg);
    let shape = Shape::seq(Shape::named("Boolean"));
    assert_eq!(synth.synthesize(&shape, Mode::DeserializeIntoFrozen).to_string(), "freeze(x)");
    assert_eq!(synthesize(&shape, Mode::DeserializeIntoFrozen).to_string(), "freeze(each(x, |v| deep_freeze(v)))");
}
