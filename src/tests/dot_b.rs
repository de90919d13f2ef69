use crate::tests::parse;

#[test]
fn two_parameters_with_row_override() {
    let run = parse(
        ".B SOURCE 20240601 Z DH12/HG/QR\nLOC1 1.2/3.4\nLOC2 DM07010700/5.6/7.8\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 4);
    assert_eq!(run.summary.error_count, 0);

    // LOC1 takes the header time for both parameters
    assert_eq!(run.records[0].location, "LOC1");
    assert_eq!(run.records[0].parameter_code.as_str(), "HGIRZZZ");
    assert_eq!(run.records[1].parameter_code.as_str(), "QRIRZZZ");
    for record in &run.records[..2] {
        let obs = &record.obs_time;
        assert_eq!((obs.month(), obs.day(), obs.hour()), (6, 1, 12));
    }

    // LOC2's DM override is zero-padded right and date-shifts both columns
    assert_eq!(run.records[2].location, "LOC2");
    for record in &run.records[2..] {
        let obs = &record.obs_time;
        assert_eq!((obs.month(), obs.day(), obs.hour()), (7, 1, 7));
    }
    assert_eq!(run.records[2].value, 5.6);
    assert_eq!(run.records[3].value, 7.8);

    // the .B source station rides along on every record
    for record in &run.records {
        assert_eq!(record.message_source.as_deref(), Some("SOURCE"));
        assert!(!record.revised);
    }
}

#[test]
fn missing_end_still_emits_body() {
    let run = parse(".B STN 20240601 Z DH12/HG\nLOC1 1.2\n", true, false);
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].value, 1.2);
    // the synthesized .END is reported once
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn header_continuation_lines_merge() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG\n.B1 /QR\nLOC1 1.2/3.4\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.records[1].parameter_code.as_str(), "QRIRZZZ");
}

#[test]
fn default_time_is_24z_for_local_zones() {
    // without a date operator a non-Zulu .B anchors on 24:00 local
    let run = parse(".B STN 20240601 ES/HG\nLOC1 1.2\n.END\n", true, false);
    assert_eq!(run.records.len(), 1);
    let obs = &run.records[0].obs_time;
    // 24:00 Eastern standard = 05:00Z on the next day
    assert_eq!((obs.month(), obs.day(), obs.hour()), (6, 2, 5));
}

#[test]
fn pending_relative_delta_applies_per_row() {
    let run = parse(
        ".B STN 20240601 Z DH12/DRH-1/HG\nLOC1 1.0\nLOC2 2.0\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 2);
    for record in &run.records {
        assert_eq!(record.obs_time.hour(), 11);
    }
}

#[test]
fn too_many_values_warns_and_truncates() {
    let run = parse(".B STN 20240601 Z DH12/HG\nLOC1 1.2/3.4\n.END\n", true, false);
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.summary.warning_count, 1);
}

#[test]
fn short_row_warns() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG/QR\nLOC1 1.2\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.summary.warning_count, 1);
}

#[test]
fn null_fields_advance_columns() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG/QR\nLOC1 /3.4\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].parameter_code.as_str(), "QRIRZZZ");
    assert_eq!(run.records[0].value, 3.4);
    // a skipped column still counts against the parameter count
    assert_eq!(run.summary.warning_count, 1);
}

#[test]
fn per_row_unit_override() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG\nLOC1 DUS/1.0\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 1);
    assert!((run.records[0].value - 3.2808399).abs() < 1e-9);
}

#[test]
fn per_row_qualifier_override() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG/QR\nLOC1 DQG/1.0/2.0S\n.END\n",
        true,
        false,
    );
    assert_eq!(run.records[0].qualifier, 'G');
    assert_eq!(run.records[1].qualifier, 'S');
}

#[test]
fn header_creation_time() {
    let run = parse(
        ".B STN 20240601 Z DH12/DC202405311200/HG\nLOC1 1.0\n.END\n",
        true,
        false,
    );
    let create = run.records[0].create_time.as_ref().unwrap();
    assert_eq!((create.month(), create.day(), create.hour()), (5, 31, 12));
}

#[test]
fn data_between_header_lines_recovers() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG\nLOC1 1.2\n.B1 /QR\nLOC2 2.0/3.0\n.END\n",
        true,
        false,
    );
    // the stray body line is reported and dropped, the header resumes
    assert_eq!(run.summary.error_count, 1);
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.records[0].location, "LOC2");
}

#[test]
fn bad_body_line_is_reported() {
    let run = parse(
        ".B STN 20240601 Z DH12/HG\n@@ 1.2\nLOC2 2.5\n.END\n",
        true,
        false,
    );
    assert_eq!(run.summary.error_count, 1);
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].location, "LOC2");
}

#[test]
fn reject_problematic_purges_whole_message() {
    let input = ".B STN 20240601 Z DH12/HG/QR\nLOC1 1.2/xx\nLOC2 2.0/3.0\n.END\n";
    let kept = parse(input, true, false);
    assert!(kept.records.len() >= 3);
    let purged = parse(input, true, true);
    assert!(purged.records.is_empty());
}
