use crossterm::event::KeyCode;
use dataportal::{AggOperator, AppConfig, AppEvent, ChartKind, Tab};
use ratatui::{backend::TestBackend, Terminal};
use tempfile::TempDir;

mod common;
use common::{drive, key};

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buf = terminal.backend().buffer();
    let area = buf.area;
    let mut out = String::new();
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            out.push_str(buf[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

fn opened_app(dir: &TempDir) -> dataportal::App {
    let path = common::write_file(dir.path(), "sales.csv", common::SALES_CSV);
    let mut config = AppConfig::default();
    config.charts.export_dir = Some(dir.path().join("charts").display().to_string());
    let mut app = common::app_with(config);
    common::open(&mut app, &path);
    app
}

#[test]
fn open_loads_the_file() {
    let dir = TempDir::new().unwrap();
    let app = opened_app(&dir);
    assert!(!app.error_modal.active);
    let ds = app.session().dataset().unwrap();
    assert_eq!(ds.height(), 4);
    assert_eq!(app.session().source(), Some("sales.csv"));
    assert_eq!(app.status(), Some("Loaded sales.csv"));
}

#[test]
fn missing_file_shows_error_modal() {
    let dir = TempDir::new().unwrap();
    let mut app = common::app_with(AppConfig::default());
    common::open(&mut app, &dir.path().join("nope.csv"));
    assert!(app.error_modal.active);
    assert!(app.error_modal.message.contains("not found"));
    assert!(app.session().dataset().is_none());

    // Esc closes the modal instead of quitting
    assert!(drive(&mut app, key(KeyCode::Esc)).is_none());
    assert!(!app.error_modal.active);
    assert!(matches!(
        drive(&mut app, key(KeyCode::Char('q'))),
        Some(AppEvent::Exit)
    ));
}

#[test]
fn malformed_file_keeps_previous_dataset() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, [0xffu8, 0xfe, 0x00]).unwrap();
    common::open(&mut app, &bad);
    assert!(app.error_modal.active);
    assert_eq!(app.session().source(), Some("sales.csv"));
}

#[test]
fn row_fields_change_head_and_tail() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    drive(&mut app, key(KeyCode::Char('3')));
    assert_eq!(app.tab(), Tab::Rows);

    drive(&mut app, key(KeyCode::Left));
    drive(&mut app, key(KeyCode::Left));
    assert_eq!(app.session().ui().head_rows, 3);
    assert_eq!(app.session().output().unwrap().head.height(), 3);

    drive(&mut app, key(KeyCode::Down));
    drive(&mut app, key(KeyCode::Char('-')));
    // starts at the configured 5, one step down lands on the row count
    assert_eq!(app.session().ui().tail_rows, 4);
    assert_eq!(app.session().output().unwrap().tail.height(), 4);
}

#[test]
fn enter_counts_values() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    drive(&mut app, key(KeyCode::Char('6')));
    assert_eq!(app.tab(), Tab::ValueCounts);
    assert!(app.session().output().unwrap().value_counts.is_none());

    drive(&mut app, key(KeyCode::Enter));
    let counts = match app.session().output().unwrap().value_counts.as_ref() {
        Some(Ok(view)) => &view.counts,
        other => panic!("expected counts, got {:?}", other),
    };
    assert_eq!(counts.table.text_values("city").unwrap(), vec!["A", "B"]);

    // picking another column hides the stale counts
    drive(&mut app, key(KeyCode::Right));
    assert_eq!(app.session().ui().count_column.as_deref(), Some("sales"));
    assert!(app.session().output().unwrap().value_counts.is_none());
}

#[test]
fn group_by_through_the_form() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    drive(&mut app, key(KeyCode::Char('7')));
    assert_eq!(app.tab(), Tab::GroupBy);

    // cursor starts on "city"
    drive(&mut app, key(KeyCode::Char(' ')));
    assert_eq!(app.session().ui().group_by, vec!["city".to_string()]);
    let sums = match app.session().output().unwrap().group_by.as_ref() {
        Some(Ok(view)) => view.table.f64_values("newcol").unwrap(),
        other => panic!("expected group-by, got {:?}", other),
    };
    assert_eq!(sums, vec![Some(30.0), Some(70.0)]);

    // operator is the third field
    drive(&mut app, key(KeyCode::Down));
    drive(&mut app, key(KeyCode::Down));
    let before = app.session().ui().operator;
    drive(&mut app, key(KeyCode::Right));
    let after = app.session().ui().operator;
    assert_ne!(before, after);
    let expected = AggOperator::ALL
        .iter()
        .position(|op| *op == before)
        .map(|i| AggOperator::ALL[(i + 1) % AggOperator::ALL.len()])
        .unwrap();
    assert_eq!(after, expected);

    // chart kind is next; switching to pie adds its channels to the form
    drive(&mut app, key(KeyCode::Down));
    while app.session().ui().chart_kind != ChartKind::Pie {
        drive(&mut app, key(KeyCode::Right));
    }
    match app.session().output().unwrap().group_by.as_ref() {
        Some(Ok(view)) => {
            assert_eq!(view.chart.spec.kind, ChartKind::Pie);
            assert!(view.chart.data.is_ok());
        }
        other => panic!("expected group-by, got {:?}", other),
    }
}

#[test]
fn export_writes_svg_files() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);

    // nothing on screen yet
    drive(&mut app, key(KeyCode::Char('e')));
    assert!(app.status().unwrap().starts_with("No charts to export"));

    drive(&mut app, key(KeyCode::Char('6')));
    drive(&mut app, key(KeyCode::Enter));
    drive(&mut app, key(KeyCode::Char('7')));
    drive(&mut app, key(KeyCode::Char(' ')));
    drive(&mut app, key(KeyCode::Char('e')));

    assert!(!app.error_modal.active, "{}", app.error_modal.message);
    let charts = dir.path().join("charts");
    let mut names: Vec<String> = std::fs::read_dir(&charts)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "sales-1-bar.svg",
            "sales-2-line.svg",
            "sales-3-pie.svg",
            "sales-4-line.svg",
        ]
    );
    let svg = std::fs::read_to_string(charts.join("sales-4-line.svg")).unwrap();
    assert!(svg.contains("<svg"));
}

#[test]
fn reload_picks_up_changes() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    drive(&mut app, key(KeyCode::Char('7')));
    drive(&mut app, key(KeyCode::Char(' ')));

    common::write_file(
        dir.path(),
        "sales.csv",
        "city,sales\nA,1\nC,2\nC,3\n",
    );
    drive(&mut app, key(KeyCode::Char('r')));
    assert_eq!(app.session().dataset().unwrap().height(), 3);
    // selections survive the reload
    let cities = match app.session().output().unwrap().group_by.as_ref() {
        Some(Ok(view)) => view.table.text_values("city").unwrap(),
        other => panic!("expected group-by, got {:?}", other),
    };
    assert_eq!(cities, vec!["A", "C"]);
}

#[test]
fn every_tab_renders() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    app.enable_debug();
    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

    let expected = [
        (Tab::Data, "sales.csv"),
        (Tab::Summary, "Statistics"),
        (Tab::Rows, "Head rows"),
        (Tab::Types, "dtype"),
        (Tab::Columns, "city"),
        (Tab::ValueCounts, "Press Enter"),
        (Tab::GroupBy, "Group by"),
    ];
    for (tab, text) in expected {
        assert_eq!(app.tab(), tab);
        terminal
            .draw(|frame| frame.render_widget(&mut app, frame.area()))
            .unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains(text), "{:?} tab is missing {:?}", tab, text);
        assert!(screen.contains("frames:"));
        drive(&mut app, key(KeyCode::Tab));
    }
    assert_eq!(app.tab(), Tab::Data);
}

#[test]
fn help_overlay_swallows_keys() {
    let dir = TempDir::new().unwrap();
    let mut app = opened_app(&dir);
    drive(&mut app, key(KeyCode::Char('?')));
    assert!(drive(&mut app, key(KeyCode::Tab)).is_none());
    assert_eq!(app.tab(), Tab::Data);

    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal
        .draw(|frame| frame.render_widget(&mut app, frame.area()))
        .unwrap();
    assert!(screen_text(&terminal).contains("Help"));

    drive(&mut app, key(KeyCode::Esc));
    drive(&mut app, key(KeyCode::Tab));
    assert_eq!(app.tab(), Tab::Summary);
}
