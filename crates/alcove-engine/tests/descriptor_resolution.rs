//! Descriptor grammar and resolution chain behavior, end to end through
//! the public resolver.

use alcove_engine::image::ModuleBuilder;
use alcove_engine::modules::ModuleRegistry;
use alcove_engine::resolve::resolve;
use alcove_engine::types::{self, TypeTable};
use alcove_engine::EngineError;

fn fixture() -> (TypeTable, ModuleRegistry) {
    let mut table = TypeTable::new();
    let mut registry = ModuleRegistry::new();

    let widgets = ModuleBuilder::new("widgets")
        .class("Greeter")
        .field("Prefix", "Str")
        .finish()
        .class("B")
        .finish()
        .generic_class("Pair`2", &["A", "B"])
        .field("First", "A")
        .field("Second", "B")
        .finish()
        .build();
    registry.load_image(&mut table, "widgets", widgets).unwrap();

    let tools = ModuleBuilder::new("tools")
        .class("Greeter")
        .field("Kind", "Int")
        .finish()
        .build();
    registry.load_image(&mut table, "tools", tools).unwrap();

    (table, registry)
}

#[test]
fn test_origin_qualifier_selects_between_homonyms() {
    let (mut table, registry) = fixture();

    let widgets_greeter =
        resolve(&mut table, &registry, "Greeter, widgets", &[]).unwrap();
    let tools_greeter = resolve(&mut table, &registry, "Greeter, tools", &[]).unwrap();
    assert_ne!(widgets_greeter, tools_greeter);

    // Unqualified, load order decides.
    let first = resolve(&mut table, &registry, "Greeter", &[]).unwrap();
    assert_eq!(first, widgets_greeter);
}

#[test]
fn test_origin_match_is_case_insensitive_with_noise_ignored() {
    let (mut table, registry) = fixture();
    let a = resolve(&mut table, &registry, "Greeter, widgets", &[]).unwrap();
    let b = resolve(&mut table, &registry, "greeter, WIDGETS", &[]).unwrap();
    let c = resolve(
        &mut table,
        &registry,
        "Greeter, widgets, Version=2.1, Culture=neutral",
        &[],
    )
    .unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_source_restriction_overrides_load_order() {
    let (mut table, registry) = fixture();
    let tools_greeter = resolve(&mut table, &registry, "Greeter", &["tools"]).unwrap();
    assert_eq!(table.descriptor_of(tools_greeter), "Greeter, tools");
}

#[test]
fn test_single_character_trailing_argument_survives() {
    let (mut table, registry) = fixture();
    let id = resolve(&mut table, &registry, "Pair`2[Int,B], widgets", &[]).unwrap();
    let fields = table.fields_of(id);
    assert_eq!(fields[0].ty, "Int");
    assert_eq!(fields[1].ty, "B, widgets");
}

#[test]
fn test_mixed_plain_and_qualified_arguments() {
    let (mut table, registry) = fixture();
    let id = resolve(
        &mut table,
        &registry,
        "Pair`2[[Greeter, tools],Str], widgets",
        &[],
    )
    .unwrap();
    assert_eq!(table.fields_of(id)[0].ty, "Greeter, tools");
    assert_eq!(table.fields_of(id)[1].ty, "Str");
}

#[test]
fn test_generic_argument_can_be_generic() {
    let (mut table, registry) = fixture();
    let id = resolve(
        &mut table,
        &registry,
        "Pair`2[List`1[Int],Str], widgets",
        &[],
    )
    .unwrap();
    assert_eq!(table.fields_of(id)[0].ty, "List`1[Int]");

    // The nested closed list became a real type along the way.
    let list = resolve(&mut table, &registry, "List`1[Int]", &[]).unwrap();
    assert_eq!(table.list_element(list), Some(types::INT));
}

#[test]
fn test_unresolvable_nested_argument_fails_the_whole_resolution() {
    let (mut table, registry) = fixture();
    assert!(matches!(
        resolve(&mut table, &registry, "Pair`2[List`1[Ghost],Int], widgets", &[]),
        Err(EngineError::Resolution(_))
    ));
    // No partially-closed type was registered along the way.
    assert_eq!(table.lookup("List`1[Ghost]"), None);
}

#[test]
fn test_arity_must_match_argument_count() {
    let (mut table, registry) = fixture();
    for bad in ["Pair`2[Int], widgets", "Pair`2[Int,Str,Bool], widgets", "List`1[]"] {
        assert!(
            matches!(
                resolve(&mut table, &registry, bad, &[]),
                Err(EngineError::DescriptorSyntax(_))
            ),
            "`{}` should be rejected",
            bad
        );
    }
}

#[test]
fn test_malformed_descriptors_are_syntax_errors() {
    let (mut table, registry) = fixture();
    for bad in ["", "List`1[Int", "List`1[Int]]", "Pair[Int,Str]"] {
        assert!(
            matches!(
                resolve(&mut table, &registry, bad, &[]),
                Err(EngineError::DescriptorSyntax(_))
            ),
            "`{}` should be a syntax error",
            bad
        );
    }
}

#[test]
fn test_unknown_names_are_resolution_errors() {
    let (mut table, registry) = fixture();
    for missing in ["Ghost", "Ghost, widgets", "Greeter, nowhere"] {
        assert!(
            matches!(
                resolve(&mut table, &registry, missing, &[]),
                Err(EngineError::Resolution(_))
            ),
            "`{}` should fail resolution",
            missing
        );
    }
}

#[test]
fn test_closed_generic_descriptor_round_trips() {
    let (mut table, registry) = fixture();
    let id = resolve(
        &mut table,
        &registry,
        "Pair`2[[Greeter, widgets],Int], widgets",
        &[],
    )
    .unwrap();
    let canonical = table.descriptor_of(id);
    let again = resolve(&mut table, &registry, &canonical, &[]).unwrap();
    assert_eq!(id, again);
}
