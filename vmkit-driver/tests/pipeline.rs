//! Full pipeline smoke tests: parse -> lower -> link -> load -> run,
//! driven through `vmkit_driver::pipeline::run_pipeline` directly so no
//! process is spawned (spec.md §8 scenario 5).

use std::io::Write;
use std::path::PathBuf;

use vmkit_driver::cli::Args;
use vmkit_driver::pipeline::run_pipeline;

fn write_source(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("vmkit_pipeline_test_{name}_{}.vk", std::process::id()));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

fn base_args(input: PathBuf) -> Args {
    Args {
        input,
        ncycle: 100_000,
        ncycle_test: 0,
        dasm: false,
        ir: false,
        verbose: false,
        bare: false,
        golike: false,
        seed: Some(1),
    }
}

#[test]
fn array_store_then_exit_reports_the_exit_code() {
    let path = write_source(
        "array_exit",
        "package main\n\nfunc main() {\n\tvar a [4]int\n\ta[2] = 42\n\texit(a[2])\n}\n",
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 42);
}

#[test]
fn bare_function_mode_runs_a_single_statement_list() {
    let path = write_source("bare", "exit(7)\n");
    let mut args = base_args(path.clone());
    args.bare = true;
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 7);
}

#[test]
fn undeclared_name_is_reported_and_does_not_run() {
    let path = write_source(
        "undeclared",
        "package main\n\nfunc main() {\n\texit(missing)\n}\n",
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 1);
}

#[test]
fn passing_tests_do_not_block_the_main_run() {
    let path = write_source(
        "with_tests",
        concat!(
            "package main\n\n",
            "func TestAlwaysPasses() {\n}\n\n",
            "func main() {\n\texit(3)\n}\n",
        ),
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 3);
}

#[test]
fn if_else_runs_only_the_taken_branch() {
    let path = write_source(
        "if_else_false",
        concat!(
            "package main\n\n",
            "func main() {\n",
            "\tvar x int\n",
            "\tif 1 < 0 {\n",
            "\t\tx = 10\n",
            "\t} else {\n",
            "\t\tx = 20\n",
            "\t}\n",
            "\texit(x)\n",
            "}\n",
        ),
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 20);
}

#[test]
fn if_else_taking_the_then_branch_also_runs_correctly() {
    let path = write_source(
        "if_else_true",
        concat!(
            "package main\n\n",
            "func main() {\n",
            "\tvar x int\n",
            "\tif 1 < 2 {\n",
            "\t\tx = 10\n",
            "\t} else {\n",
            "\t\tx = 20\n",
            "\t}\n",
            "\texit(x)\n",
            "}\n",
        ),
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 10);
}

#[test]
fn a_terminating_for_loop_exits_through_its_condition() {
    let path = write_source(
        "for_terminates",
        concat!(
            "package main\n\n",
            "func main() {\n",
            "\tvar total int\n",
            "\tfor i := 0; i < 10; i = i + 1 {\n",
            "\t\ttotal = total + i\n",
            "\t}\n",
            "\texit(total)\n",
            "}\n",
        ),
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    // 0+1+...+9 == 45; reaching `exit` at all proves the loop's condition
    // branch falls out of the loop instead of looping forever or never
    // entering the body.
    assert_eq!(outcome.exit_code, 45);
}

#[test]
fn an_out_of_bounds_index_panics_with_exit_code_two() {
    let path = write_source(
        "index_out_of_bounds",
        concat!(
            "package main\n\n",
            "func main() {\n",
            "\tvar a [4]int\n",
            "\tvar i int\n",
            "\ti = 4\n",
            "\texit(a[i])\n",
            "}\n",
        ),
    );
    let args = base_args(path.clone());
    let outcome = run_pipeline(&args).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.exit_code, 2);
}
