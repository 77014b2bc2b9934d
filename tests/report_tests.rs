//! Integration tests for the reports.

use chrono::{NaiveDate, NaiveDateTime};
use rudo::config::Config;
use rudo::db::Database;
use rudo::model::RecurrenceType;
use rudo::model::TaskAttributes;
use rudo::report::{self, OutputFormat};
use rudo::services::TaskService;

fn setup() -> TaskService {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    TaskService::new(db, Config::default())
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn add(service: &TaskService, args: &[&str]) -> String {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    service.add(&args).unwrap().actionable().id.clone()
}

fn add_recurrent(service: &TaskService, kind: &str, description: &str) -> String {
    let added = service
        .add_task_at(
            TaskAttributes {
                description: Some(description.to_string()),
                due: Some(at(2020, 1, 6)),
                recurrence: Some("1w".to_string()),
                recurrence_type: Some(kind.to_string()),
                ..Default::default()
            },
            at(2020, 1, 1),
        )
        .unwrap();
    match added {
        rudo::services::AddedTask::Recurrent { parent, .. } => parent.id,
        rudo::services::AddedTask::Simple(task) => panic!("{} is not recurrent", task),
    }
}

fn column<'a>(report: &'a report::Report, header: &str) -> Vec<Option<&'a str>> {
    let index = report
        .headers
        .iter()
        .position(|h| *h == header)
        .unwrap_or_else(|| panic!("missing column {}", header));
    report.rows.iter().map(|row| row[index].as_deref()).collect()
}

#[test]
fn open_report_lists_actionable_tasks_newest_first() {
    let service = setup();
    add(&service, &["Buy", "milk"]);
    add(&service, &["Clean", "pro:house"]);
    add_recurrent(&service, "recurring", "Water the plants");

    let report = report::open_report(service.db(), service.config()).unwrap();
    assert_eq!(
        column(&report, "Description"),
        vec![Some("Water the plants"), Some("Clean"), Some("Buy milk")]
    );
    assert_eq!(column(&report, "Due"), vec![Some("2020-01-13 00:00"), None, None]);
    assert!(report.headers.contains(&"Parent"));
    assert!(!report.headers.contains(&"Tags"));
}

#[test]
fn open_report_shows_short_ids() {
    let service = setup();
    let id = add(&service, &["Buy", "milk"]);

    let report = report::open_report(service.db(), service.config()).unwrap();
    let short = column(&report, "ID")[0].unwrap();
    assert!(short.len() < id.len());
    assert_eq!(service.db().require_task(short).unwrap().id, id);
}

#[test]
fn recurrent_reports_split_by_kind() {
    let service = setup();
    let recurring = add_recurrent(&service, "recurring", "Pay the rent");
    add_recurrent(&service, "repeating", "Water the plants");

    let report =
        report::recurrent_report(service.db(), service.config(), RecurrenceType::Recurring)
            .unwrap();
    assert_eq!(column(&report, "Description"), vec![Some("Pay the rent")]);
    assert_eq!(column(&report, "Recur"), vec![Some("1w")]);
    assert_eq!(
        service
            .db()
            .require_task(column(&report, "ID")[0].unwrap())
            .unwrap()
            .id,
        recurring
    );

    let report =
        report::recurrent_report(service.db(), service.config(), RecurrenceType::Repeating)
            .unwrap();
    assert_eq!(column(&report, "Description"), vec![Some("Water the plants")]);
}

#[test]
fn frozen_report_lists_frozen_parents() {
    let service = setup();
    let parent = add_recurrent(&service, "recurring", "Pay the rent");
    service.freeze(&parent, false).unwrap();

    let report = report::frozen_report(service.db(), service.config()).unwrap();
    assert_eq!(column(&report, "Description"), vec![Some("Pay the rent")]);
    assert_eq!(column(&report, "RecurType"), vec![Some("recurring")]);
}

#[test]
fn projects_report_counts_open_tasks() {
    let service = setup();
    add(&service, &["Clean", "pro:house"]);
    add(&service, &["Mop", "pro:house"]);
    let done = add(&service, &["Report", "pro:office"]);
    service.do_tasks(&[done], "now", false).unwrap();
    add(&service, &["Loose", "end"]);

    let report = report::projects_report(service.db()).unwrap();
    assert_eq!(column(&report, "Name"), vec![Some("None"), Some("house")]);
    assert_eq!(column(&report, "Tasks"), vec![Some("1"), Some("2")]);
    assert_eq!(
        column(&report, "Description"),
        vec![Some("Tasks without project"), Some("")]
    );
}

#[test]
fn tags_report_skips_tags_without_open_tasks() {
    let service = setup();
    add(&service, &["Clean", "+chore", "+home"]);
    let done = add(&service, &["Mop", "+floor"]);
    service.do_tasks(&[done], "now", false).unwrap();

    let report = report::tags_report(service.db()).unwrap();
    assert_eq!(column(&report, "Name"), vec![Some("home"), Some("chore")]);
}

#[test]
fn json_output_uses_field_names() {
    let service = setup();
    add(&service, &["Clean", "pro:house"]);

    let report = report::projects_report(service.db()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(json[0]["id"], "house");
    assert_eq!(json[0]["open_tasks"], "1");
}
