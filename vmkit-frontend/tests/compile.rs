//! End-to-end parse+sema checks over small whole programs, one per
//! scenario the rest of the workspace exercises at the machine level.

use vmkit_frontend::{compile_program, Source};

#[test]
fn array_store_and_load_round_trips_through_sema() {
    let src = "package main\n\nfunc main() {\n\tvar a [4]int\n\ta[2] = 42\n\texit(a[2])\n}\n";
    let (pkgs, diags) = compile_program(&[Source::new("main.vk", src)]);
    assert!(diags.is_empty(), "{diags:?}");
    let main_pkg = &pkgs[0];
    assert!(main_pkg.has_main());
    assert_eq!(main_pkg.funcs.len(), 1);
}

#[test]
fn a_struct_with_a_method_lowers_to_a_colon_named_function() {
    let src = concat!(
        "package shapes\n\n",
        "struct Rect {\n\tw int\n\th int\n}\n\n",
        "func (r *Rect) area() int {\n\treturn r.w + r.h\n}\n",
    );
    let (pkgs, diags) = compile_program(&[Source::new("shapes.vk", src)]);
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(pkgs[0].structs.len(), 1);
    assert_eq!(pkgs[0].methods.len(), 1);
    assert_eq!(pkgs[0].methods[0].name, "Rect:area");
    assert!(pkgs[0].methods[0].sig.is_bond);
}

#[test]
fn for_loop_and_if_statement_nest_scopes_without_leaking_locals() {
    let src = concat!(
        "package main\n\n",
        "func main() {\n",
        "\tvar total int\n",
        "\tfor i := 0; i < 10; i = i + 1 {\n",
        "\t\tif i < 5 {\n",
        "\t\t\ttotal = total + i\n",
        "\t\t}\n",
        "\t}\n",
        "\texit(total)\n",
        "}\n",
    );
    let (pkgs, diags) = compile_program(&[Source::new("main.vk", src)]);
    assert!(diags.is_empty(), "{diags:?}");
    assert!(pkgs[0].has_main());
}

#[test]
fn a_reference_to_an_unknown_package_is_reported() {
    let src = "package main\n\nfunc main() {\n\texit(other.f())\n}\n";
    let (_pkgs, diags) = compile_program(&[Source::new("main.vk", src)]);
    assert_eq!(diags.len(), 1);
}

#[test]
fn func_alias_resolves_against_the_target_signature() {
    let a = "package a\n\nfunc f() int {\n\treturn 1\n}\n";
    let b = "package b\n\nfunc g = a.f\n";
    let (pkgs, diags) = compile_program(&[Source::new("a.vk", a), Source::new("b.vk", b)]);
    assert!(diags.is_empty(), "{diags:?}");
    let pkg_b = pkgs.iter().find(|p| p.name == "b").unwrap();
    assert_eq!(pkg_b.func_aliases.len(), 1);
    assert_eq!(pkg_b.func_aliases[0].of_pkg, "a");
}
