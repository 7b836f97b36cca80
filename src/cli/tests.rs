//! Tests for the CLI module.

use super::*;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tempfile::TempDir;

fn run_in(dir: &Path, args: &[&str]) -> CliOutput {
    let mut full = vec!["mtn", "--collection", dir.to_str().unwrap()];
    full.extend_from_slice(args);
    run(Cli::parse_from(full))
}

fn init_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["init"]);
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "{:?}", output.stderr);
    dir
}

fn stdout_text(output: &CliOutput) -> String {
    output.stdout.join("\n")
}

#[test]
fn test_parse_aliases() {
    let cli = Cli::parse_from(["mtn", "c", "Buy milk"]);
    assert!(matches!(cli.command, Command::Create { .. }));
    let cli = Cli::parse_from(["mtn", "ls"]);
    assert!(matches!(cli.command, Command::List { .. }));
    let cli = Cli::parse_from(["mtn", "done", "buy-milk"]);
    assert!(matches!(cli.command, Command::Complete { .. }));
    let cli = Cli::parse_from(["mtn", "rm", "buy-milk", "--force"]);
    assert!(matches!(cli.command, Command::Delete { force: true, .. }));
}

#[test]
fn test_parse_timer_subcommands() {
    let cli = Cli::parse_from(["mtn", "timer", "start", "buy-milk"]);
    let Command::Timer(TimerCommand::Start { reference, .. }) = cli.command else {
        panic!("expected timer start");
    };
    assert_eq!(reference, "buy-milk");
    let cli = Cli::parse_from(["mtn", "timer", "stop"]);
    assert!(matches!(cli.command, Command::Timer(TimerCommand::Stop)));
}

#[test]
fn test_init_creates_schema() {
    let dir = init_dir();
    assert!(dir.path().join("mdbase.yaml").is_file());
    assert!(dir.path().join("_types/task.md").is_file());
    assert!(dir.path().join("tasks").is_dir());
}

#[test]
fn test_init_refuses_rerun_without_force() {
    let dir = init_dir();
    let output = run_in(dir.path(), &["init"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr.join("\n").contains("--force"));
    let output = run_in(dir.path(), &["init", "--force"]);
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
}

#[test]
fn test_commands_fail_without_collection() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["list"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr.join("\n").contains("mdbase.yaml not found"));
}

#[test]
fn test_create_then_list() {
    let dir = init_dir();
    let output = run_in(
        dir.path(),
        &["create", "Water plants @home #garden due 2030-01-15 !high"],
    );
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "{:?}", output.stderr);
    assert!(stdout_text(&output).contains("Created \"Water plants\""));
    assert!(dir.path().join("tasks/water-plants.md").is_file());

    let output = run_in(dir.path(), &["list"]);
    let text = stdout_text(&output);
    assert!(text.contains("Water plants"));
    assert!(text.contains("due 2030-01-15"));
    assert!(text.contains("high"));
}

#[test]
fn test_create_rejects_bad_date() {
    let dir = init_dir();
    let output = run_in(dir.path(), &["create", "Pay rent due 2030-02-31"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr.join("\n").contains("Invalid date"));
}

#[test]
fn test_list_json_shape() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Solo task"]);
    let output = run_in(dir.path(), &["list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout_text(&output)).unwrap();
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "Solo task");
    assert_eq!(rows[0]["status"], "open");
    assert_eq!(rows[0]["path"], "tasks/solo-task.md");
}

#[test]
fn test_complete_non_recurring_sets_status() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "One shot"]);
    let output = run_in(dir.path(), &["complete", "One shot"]);
    assert!(stdout_text(&output).contains("Completed \"One shot\""));

    let content = fs::read_to_string(dir.path().join("tasks/one-shot.md")).unwrap();
    assert!(content.contains("status: done"));
    assert!(content.contains("completedDate:"));

    // Second completion reports without rewriting.
    let output = run_in(dir.path(), &["complete", "One shot"]);
    assert!(stdout_text(&output).contains("already completed"));
}

fn write_recurring(dir: &Path) {
    fs::write(
        dir.join("tasks/water-plants.md"),
        "---\ntitle: Water plants\nstatus: open\ntags: [task]\nscheduled: 2024-01-01\nrecurrence: FREQ=WEEKLY;BYDAY=MO\ndateCreated: 2024-01-01T08:00:00+00:00\n---\n",
    )
    .unwrap();
}

#[test]
fn test_complete_recurring_advances_schedule() {
    let dir = init_dir();
    write_recurring(dir.path());

    let output = run_in(
        dir.path(),
        &["complete", "Water plants", "--date", "2024-01-01"],
    );
    let text = stdout_text(&output);
    assert!(text.contains("Completed \"Water plants\" for 2024-01-01"));
    assert!(text.contains("Next occurrence: 2024-01-08"));

    let content = fs::read_to_string(dir.path().join("tasks/water-plants.md")).unwrap();
    assert!(content.contains("scheduled: 2024-01-08"));
    assert!(content.contains("- 2024-01-01"));
    assert!(content.contains("DTSTART:20240101"));
    // Base status is untouched for recurring tasks.
    assert!(content.contains("status: open"));
}

#[test]
fn test_skip_and_unskip_maintain_exclusion() {
    let dir = init_dir();
    write_recurring(dir.path());

    run_in(dir.path(), &["complete", "Water plants", "--date", "2024-01-01"]);
    let output = run_in(dir.path(), &["skip", "Water plants", "--date", "2024-01-01"]);
    assert!(stdout_text(&output).contains("Skipped"));

    let content = fs::read_to_string(dir.path().join("tasks/water-plants.md")).unwrap();
    let (frontmatter, _) = crate::collection::split_document(&content).unwrap();
    let skipped = frontmatter.get("skippedInstances").unwrap();
    let complete = frontmatter.get("completeInstances").unwrap();
    assert_eq!(skipped.as_sequence().unwrap().len(), 1);
    assert!(complete.as_sequence().unwrap().is_empty());

    let output = run_in(dir.path(), &["unskip", "Water plants", "--date", "2024-01-01"]);
    assert!(stdout_text(&output).contains("Restored"));
    let content = fs::read_to_string(dir.path().join("tasks/water-plants.md")).unwrap();
    let (frontmatter, _) = crate::collection::split_document(&content).unwrap();
    assert!(frontmatter
        .get("skippedInstances")
        .unwrap()
        .as_sequence()
        .unwrap()
        .is_empty());
}

#[test]
fn test_skip_rejects_non_recurring() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "One shot"]);
    let output = run_in(dir.path(), &["skip", "One shot"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr.join("\n").contains("not recurring"));
}

#[test]
fn test_update_sets_and_clears_fields() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Plain task due 2030-03-01"]);

    let output = run_in(
        dir.path(),
        &[
            "update",
            "Plain task",
            "--priority",
            "high",
            "--due",
            "",
            "--add-tag",
            "errand",
        ],
    );
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "{:?}", output.stderr);

    let content = fs::read_to_string(dir.path().join("tasks/plain-task.md")).unwrap();
    assert!(content.contains("priority: high"));
    assert!(!content.contains("due:"));
    assert!(content.contains("errand"));
    assert!(content.contains("dateModified:"));
}

#[test]
fn test_update_without_flags_errors() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Plain task"]);
    let output = run_in(dir.path(), &["update", "Plain task"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr.join("\n").contains("No fields to update"));
}

#[test]
fn test_ambiguous_reference_lists_candidates() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Water plants"]);
    run_in(dir.path(), &["create", "Water garden"]);

    let output = run_in(dir.path(), &["show", "water"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    let text = output.stderr.join("\n");
    assert!(text.contains("Ambiguous task reference \"water\"."));
    assert!(text.contains("Matches (best first):"));
    assert!(text.contains("Use a full path to disambiguate"));
}

#[test]
fn test_show_includes_instance_line() {
    let dir = init_dir();
    write_recurring(dir.path());
    let output = run_in(dir.path(), &["show", "Water plants"]);
    let text = stdout_text(&output);
    assert!(text.contains("Water plants"));
    assert!(text.contains("Recurrence: FREQ=WEEKLY;BYDAY=MO"));
    assert!(text.contains("Instance ("));
}

#[test]
fn test_delete_requires_force() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Doomed"]);
    let output = run_in(dir.path(), &["delete", "Doomed"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(dir.path().join("tasks/doomed.md").is_file());

    let output = run_in(dir.path(), &["delete", "Doomed", "--force"]);
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(!dir.path().join("tasks/doomed.md").exists());
}

#[test]
fn test_archive_hides_from_default_list() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Old chore"]);
    run_in(dir.path(), &["archive", "Old chore"]);

    let output = run_in(dir.path(), &["list"]);
    assert!(!stdout_text(&output).contains("Old chore"));
    let output = run_in(dir.path(), &["list", "--all"]);
    assert!(stdout_text(&output).contains("Old chore"));

    // Idempotent.
    let output = run_in(dir.path(), &["archive", "Old chore"]);
    assert!(stdout_text(&output).contains("already archived"));
}

#[test]
fn test_search_ranks_title_above_body() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Dentist appointment"]);
    run_in(
        dir.path(),
        &["create", "Errands // call the dentist office"],
    );

    let output = run_in(dir.path(), &["search", "dentist"]);
    let text = stdout_text(&output);
    let title_pos = text.find("Dentist appointment").unwrap();
    let body_pos = text.find("Errands").unwrap();
    assert!(title_pos < body_pos, "title match should rank first: {text}");
}

#[test]
fn test_timer_start_stop_cycle() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Deep work"]);
    run_in(dir.path(), &["create", "Other thing"]);

    let output = run_in(dir.path(), &["timer", "start", "Deep work"]);
    assert!(stdout_text(&output).contains("Timer started"));

    // Only one running timer across the collection.
    let output = run_in(dir.path(), &["timer", "start", "Other thing"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr.join("\n").contains("already running"));

    let output = run_in(dir.path(), &["timer", "status"]);
    assert!(stdout_text(&output).contains("Timer running on \"Deep work\""));

    let output = run_in(dir.path(), &["timer", "stop"]);
    assert!(stdout_text(&output).contains("Timer stopped"));

    let content = fs::read_to_string(dir.path().join("tasks/deep-work.md")).unwrap();
    assert!(content.contains("startTime:"));
    assert!(content.contains("endTime:"));
    assert!(content.contains("duration:"));

    let output = run_in(dir.path(), &["timer", "stop"]);
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[test]
fn test_projects_aggregate_counts() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Plan sprint +roadmap"]);
    run_in(dir.path(), &["create", "Ship feature +roadmap"]);
    run_in(dir.path(), &["complete", "Ship feature"]);

    let output = run_in(dir.path(), &["projects", "list"]);
    assert!(stdout_text(&output).contains("roadmap: 1 open, 1 done"));

    let output = run_in(dir.path(), &["projects", "show", "roadmap"]);
    let text = stdout_text(&output);
    assert!(text.contains("Plan sprint"));
    assert!(text.contains("Ship feature"));
}

#[test]
fn test_stats_counts_and_overdue() {
    let dir = init_dir();
    run_in(dir.path(), &["create", "Late thing due 2020-01-01"]);
    run_in(dir.path(), &["create", "Done thing"]);
    run_in(dir.path(), &["complete", "Done thing"]);

    let output = run_in(dir.path(), &["stats", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout_text(&output)).unwrap();
    assert_eq!(parsed["total"], 2);
    assert_eq!(parsed["by_status"]["open"], 1);
    assert_eq!(parsed["by_status"]["done"], 1);
    assert_eq!(parsed["overdue"], 1);
    assert_eq!(parsed["completion_rate"], 50.0);
}
