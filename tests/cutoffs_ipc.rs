use serde_json::json;

mod test_support;
use test_support::{full_cutoff_row, request_err, request_ok, spawn_sidecar, subject_row};

#[test]
fn uploaded_table_rejects_bad_rows_and_drives_grading() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let mut scaled = full_cutoff_row("수학", "2", [85.0, 75.0, 65.0, 55.0, 45.0, 35.0, 25.0, 15.0, 0.0]);
    scaled["max_scaled_score"] = json!(150);
    let mut incomplete = full_cutoff_row("국어", "01", [90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 0.0]);
    incomplete["grade_5_cutoff"] = json!("");
    let inverted = full_cutoff_row("영어", "07", [90.0, 95.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 0.0]);

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cutoffs.load",
        json!({ "rows": [scaled, incomplete, inverted] }),
    );
    assert_eq!(summary["loaded"], json!(["수학"]));
    let rejected = summary["rejected"].as_array().expect("rejected");
    let subjects: Vec<&str> = rejected.iter().filter_map(|r| r["subject"].as_str()).collect();
    assert_eq!(subjects, vec!["국어", "영어"]);
    assert_eq!(rejected[0]["row"], json!(1));

    let entry = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "cutoffs.get",
        json!({ "subject": "수학" }),
    );
    assert_eq!(entry["origin"], json!("loaded"));
    assert_eq!(entry["entry"]["maxScaledScore"], json!(150.0));
    assert_eq!(entry["entry"]["anchors"][1], json!(135.0));
    request_err(
        &mut stdin,
        &mut reader,
        "3",
        "cutoffs.get",
        json!({ "subject": "국어" }),
        "not_found",
    );

    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.resolveCode",
        json!({ "code": "2.0" }),
    );
    assert_eq!(
        resolved,
        json!({ "code": "02", "subjectName": "수학", "catalogueName": "수학" })
    );
    let unresolved = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "subjects.resolveCode",
        json!({ "code": 1 }),
    );
    assert_eq!(unresolved["subjectName"], json!(null));
    assert_eq!(unresolved["catalogueName"], json!("국어"));

    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "roster.load",
        json!({ "rows": [{ "수험번호": "1001", "이름": "Kim" }] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "subjects.load",
        json!({ "subject": "Math", "rows": [subject_row(json!("1001"), "02", json!(80), "")] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "subjects.load",
        json!({ "subject": "Korean", "rows": [subject_row(json!("1001"), "01", json!(80), "")] }),
    );

    let result = request_ok(&mut stdin, &mut reader, "9", "results.process", json!({}));
    assert_eq!(result["cutoffOrigin"], json!("loaded"));
    let subjects = &result["records"]["1001"]["subjects"];
    assert_eq!(subjects["Math"]["grade"], json!(2));
    // 135 + (150 - 135) * 0.5
    assert_eq!(subjects["Math"]["scaledScore"], json!(142));
    assert_eq!(subjects["Korean"]["grade"], json!(null));
    assert_eq!(subjects["Korean"]["derivation"]["status"], json!("unmatched"));
    assert_eq!(subjects["Korean"]["totalScore"], json!(80.0));

    let generated = request_ok(&mut stdin, &mut reader, "10", "cutoffs.useDefault", json!({}));
    assert_eq!(generated["subjects"], json!(26));
    let result = request_ok(&mut stdin, &mut reader, "11", "results.process", json!({}));
    assert_eq!(result["records"]["1001"]["subjects"]["Korean"]["grade"], json!(2));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn korean_headers_and_percentile_columns_are_accepted() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let mut row = serde_json::Map::new();
    row.insert("과목명".into(), json!("물리학Ⅰ"));
    row.insert("과목코드".into(), json!(21));
    row.insert("만점표점".into(), json!(70));
    let cuts = [45, 40, 35, 30, 25, 20, 15, 10, 0];
    let pcts = [97.0, 89.6, 78.0, 60.0, 41.0, 24.0, 12.0, 5.0, 1.0];
    for g in 1..=9 {
        row.insert(format!("{g}등급컷"), json!(cuts[g - 1]));
        row.insert(format!("{g}등급백분위"), json!(pcts[g - 1]));
    }
    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cutoffs.load",
        json!({ "rows": [row] }),
    );
    assert_eq!(summary["loaded"], json!(["물리학 I"]));
    assert_eq!(summary["rejected"], json!([]));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.configure",
        json!({ "percentileSource": "cutoff_table" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "roster.load",
        json!({ "rows": [{ "수험번호": "5", "이름": "Park" }] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.load",
        json!({ "subject": "Inquiry-1", "rows": [subject_row(json!("5"), "21.0", json!(42), "")] }),
    );
    let result = request_ok(&mut stdin, &mut reader, "5", "results.process", json!({}));
    let physics = &result["records"]["5"]["subjects"]["Inquiry-1"];
    assert_eq!(physics["grade"], json!(2));
    assert_eq!(physics["percentile"], json!(89.6));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn template_rows_load_back_through_cutoffs_load() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let template = request_ok(&mut stdin, &mut reader, "1", "cutoffs.template", json!({}));
    let rows = template["rows"].as_array().expect("rows").clone();
    assert_eq!(rows.len(), 26);
    let ethics = rows
        .iter()
        .find(|r| r["과목명"] == json!("생활과 윤리"))
        .expect("ethics row");
    assert_eq!(ethics["과목코드"], json!("11"));
    assert_eq!(ethics["1등급컷"], json!(45));
    assert_eq!(ethics["만점_표점"], json!(100));
    assert_eq!(ethics["1등급_표점"], json!(100));

    let summary = request_ok(&mut stdin, &mut reader, "2", "cutoffs.load", json!({ "rows": rows }));
    assert_eq!(summary["rejected"], json!([]));
    assert_eq!(summary["unreachable"], json!([]));
    assert_eq!(summary["loaded"].as_array().expect("loaded").len(), 26);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn english_scaled_score_table_overlays_anchors() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.load",
        json!({ "rows": [{ "수험번호": "1001", "이름": "Kim" }] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.load",
        json!({ "subject": "Inquiry-1", "rows": [subject_row(json!("1001"), "21", json!(85), "")] }),
    );

    let mut row = serde_json::Map::new();
    row.insert("Subject_Name".into(), json!("Physics_I"));
    row.insert("subject_code".into(), json!("21"));
    let mut english = row.clone();
    english.insert("Subject_Name".into(), json!("English"));
    for (g, v) in [70, 66, 62, 58, 54, 50, 46, 42, 38].iter().enumerate() {
        row.insert(format!("Grade_{}_Score", g + 1), json!(v));
        english.insert(format!("Grade_{}_Score", g + 1), json!(v));
    }
    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "cutoffs.loadAnchors",
        json!({ "rows": [row, english] }),
    );
    assert_eq!(summary["applied"], json!(["물리학 I"]));
    assert_eq!(summary["rejected"][0]["subject"], json!("영어"));

    let entry = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "cutoffs.get",
        json!({ "subject": "물리학 I" }),
    );
    assert_eq!(entry["entry"]["anchors"][0], json!(70.0));

    let result = request_ok(&mut stdin, &mut reader, "5", "results.process", json!({}));
    let physics = &result["records"]["1001"]["subjects"]["Inquiry-1"];
    assert_eq!(physics["grade"], json!(2));
    // 66 + (70 - 66) * 0.5
    assert_eq!(physics["scaledScore"], json!(68));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "cutoffs.loadAnchors",
        json!({ "rows": [{ "Subject_Name": "Math" }] }),
        "missing_columns",
    );
    assert_eq!(e["details"]["missing"].as_array().expect("missing").len(), 9);

    drop(stdin);
    let _ = child.wait();
}
